mod board;
mod codec;
mod config;
mod error;
mod events;
mod filter;
mod models;
mod repo;
mod search;
mod session;
mod store;
mod tui;
mod validate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use board::Board;
use config::Config;
use error::BoardError;
use filter::{ExperienceBand, JobFilter, SalaryBand};
use models::{ApplicationStatus, Job, JobStatus, UserType};
use repo::ApplyOutcome;
use validate::{ApplicantForm, CompanyForm, JobForm, JobPatch, ProfilePatch};

#[derive(Parser)]
#[command(name = "jobboard")]
#[command(about = "Local job board - post jobs, apply, and track applications")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data store and show where it lives
    Init,

    /// Choose what kind of account to register next
    Signup {
        /// applicant or recruiter
        user_type: UserType,
    },

    /// Register an account and log in
    Register {
        #[command(subcommand)]
        command: RegisterCommands,
    },

    /// Log in
    Login {
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Log out
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Update your profile
    Profile {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        contact: Option<String>,

        #[arg(long)]
        degree: Option<String>,

        /// Years of experience, free text
        #[arg(long)]
        experience: Option<String>,

        #[arg(long)]
        location: Option<String>,

        /// Path or link to your resume
        #[arg(long)]
        resume: Option<String>,

        #[arg(long)]
        photo: Option<String>,
    },

    /// List jobs
    Jobs {
        /// Title contains
        #[arg(short, long)]
        title: Option<String>,

        /// Location contains
        #[arg(short, long)]
        location: Option<String>,

        /// Experience band in years (0-2, 2-5, 5-10, 10+)
        #[arg(short, long)]
        experience: Option<ExperienceBand>,

        /// Salary band in lakhs (0-10, 10-20, 20+)
        #[arg(short, long)]
        salary: Option<SalaryBand>,
    },

    /// Show job details
    Show {
        /// Job ID
        id: i64,
    },

    /// Post a job
    Post {
        #[arg(long)]
        title: String,

        /// Company name, for roles that post on behalf of a company
        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        location: String,

        /// Display salary, e.g. "₹10L - ₹15L"
        #[arg(long)]
        salary: String,

        /// Experience range, e.g. 2-5 or 5+
        #[arg(long)]
        experience: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Full-time, Part-time, Contract, ...
        #[arg(long = "type")]
        job_type: Option<String>,

        /// Comma-separated skills
        #[arg(long, value_delimiter = ',')]
        skills: Vec<String>,
    },

    /// Edit a posted job
    EditJob {
        /// Job ID
        id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        salary: Option<String>,

        #[arg(long)]
        experience: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long = "type")]
        job_type: Option<String>,

        #[arg(long, value_delimiter = ',')]
        skills: Option<Vec<String>>,
    },

    /// Open or close a job; toggles when no status is given
    Status {
        /// Job ID
        id: i64,

        /// active or inactive
        status: Option<JobStatus>,
    },

    /// Delete a job
    DeleteJob {
        /// Job ID
        id: i64,
    },

    /// Apply to a job
    Apply {
        /// Job ID
        id: i64,
    },

    /// Withdraw an application
    Withdraw {
        /// Job ID
        id: i64,
    },

    /// List the applications you can see
    Applications,

    /// Set the status of an application
    Review {
        /// Job ID
        job_id: i64,

        /// Applicant's user ID
        user_id: i64,

        /// applied, reviewed, shortlisted, rejected or hired
        status: ApplicationStatus,
    },

    /// Save a job for later
    Save {
        /// Job ID
        id: i64,
    },

    /// Remove a saved job
    Unsave {
        /// Job ID
        id: i64,
    },

    /// List saved jobs
    Saved,

    /// Manage registered users
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// List registered companies
    Companies,

    /// Show counts for your dashboard
    Dashboard,

    /// Suggest job titles (searches are only remembered inside `browse`)
    Suggest {
        /// Part of a title
        #[arg(default_value = "")]
        prefix: String,

        #[arg(short, long, default_value = "8")]
        limit: usize,
    },

    /// Browse jobs interactively
    Browse {
        /// Start with this title filter
        #[arg(short, long)]
        title: Option<String>,
    },
}

#[derive(Subcommand)]
enum RegisterCommands {
    /// Register as a job seeker
    Applicant {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        contact: Option<String>,

        #[arg(long)]
        degree: Option<String>,

        #[arg(long)]
        experience: Option<String>,

        #[arg(long)]
        location: Option<String>,
    },

    /// Register a company and its recruiter account
    Company {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// 10-digit contact number
        #[arg(long)]
        contact: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        website: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users
    List {
        /// Filter by user type
        #[arg(short = 't', long = "type")]
        user_type: Option<UserType>,
    },

    /// Delete a user
    Delete {
        /// User ID
        id: i64,
    },

    /// Change a user's type
    SetType {
        /// User ID
        id: i64,

        user_type: UserType,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("jobboard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobboard=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load();
    let board = Board::open(&config)
        .with_context(|| format!("Failed to open data store at {}", config.db_path.display()))?;

    let result = run(&board, &config, cli.command);
    if let Some(error) = result.as_ref().err().and_then(|e| e.downcast_ref::<BoardError>()) {
        // Store failures are fatal; everything else is a message for the user.
        if !matches!(error, BoardError::Store(_)) {
            report(error);
            std::process::exit(1);
        }
    }
    result
}

fn report(error: &BoardError) {
    match error {
        BoardError::Validation(errors) => {
            eprintln!("Please fix the following:");
            for (field, message) in errors.iter() {
                eprintln!("  {}: {}", field, message);
            }
        }
        other => eprintln!("{}", other),
    }
}

fn run(board: &Board, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            println!("Data store ready at {}", config.db_path.display());
            let roles = config.roles();
            if roles.is_empty() {
                println!(
                    "No staff accounts configured (expected at {})",
                    config.roles_path.display()
                );
            } else {
                println!(
                    "{} staff account(s) loaded from {}",
                    roles.len(),
                    config.roles_path.display()
                );
            }
        }

        Commands::Signup { user_type } => {
            if user_type.is_privileged() {
                println!("Staff accounts are configured in {}", config.roles_path.display());
            } else {
                board.session().begin_signup(user_type)?;
                let next = match user_type {
                    UserType::Recruiter => "jobboard register company",
                    _ => "jobboard register applicant",
                };
                println!("Signing up as {}. Continue with: {}", user_type, next);
            }
        }

        Commands::Register { command } => match command {
            RegisterCommands::Applicant {
                name,
                email,
                password,
                contact,
                degree,
                experience,
                location,
            } => {
                let user = board.register_applicant(&ApplicantForm {
                    name,
                    email,
                    password,
                    contact,
                    degree,
                    experience,
                    location,
                })?;
                println!("Welcome, {}! You are logged in (user #{}).", user.display_name(), user.id);
            }

            RegisterCommands::Company {
                name,
                email,
                contact,
                password,
                location,
                website,
                description,
            } => {
                let (company, user) = board.register_company(&CompanyForm {
                    name,
                    email,
                    contact,
                    password,
                    location,
                    website,
                    description,
                })?;
                println!(
                    "Registered {}. Logged in as recruiter {} (user #{}).",
                    company.name, user.email, user.id
                );
            }
        },

        Commands::Login { email, password } => {
            let user = board.session().login(&email, &password)?;
            println!("Logged in as {} ({}).", user.display_name(), user.user_type);
        }

        Commands::Logout => {
            board.session().logout()?;
            println!("Logged out.");
        }

        Commands::Whoami => match board.context().user() {
            Some(user) => {
                println!("User #{}", user.id);
                println!("Name: {}", user.display_name());
                println!("Email: {}", user.email);
                println!("Type: {}", user.user_type);
                if let Some(contact) = &user.contact {
                    println!("Contact: {}", contact);
                }
                if let Some(degree) = &user.degree {
                    println!("Degree: {}", degree);
                }
                if let Some(experience) = &user.experience {
                    println!("Experience: {}", experience);
                }
                if let Some(location) = &user.location {
                    println!("Location: {}", location);
                }
                if let Some(resume) = &user.resume {
                    println!("Resume: {}", resume);
                }
            }
            None => println!("Not logged in."),
        },

        Commands::Profile {
            name,
            contact,
            degree,
            experience,
            location,
            resume,
            photo,
        } => {
            let user = board.update_profile(&ProfilePatch {
                name,
                contact,
                degree,
                experience,
                location,
                resume,
                photo,
            })?;
            println!("Profile updated for {}.", user.display_name());
        }

        Commands::Jobs {
            title,
            location,
            experience,
            salary,
        } => {
            let jobs = board.browse_jobs(&JobFilter {
                title,
                location,
                experience,
                salary,
            });
            print_jobs(&jobs);
        }

        Commands::Show { id } => {
            let job = board.job(id)?;
            println!("Job #{}", job.id);
            println!("Title: {}", job.title);
            println!("Company: {}", job.company);
            println!("Status: {}", job.status);
            println!("Location: {}", job.location);
            println!("Salary: {}", job.salary);
            println!("Experience: {} yrs", job.experience_range);
            if let Some(job_type) = &job.job_type {
                println!("Type: {}", job_type);
            }
            if !job.skills.is_empty() {
                println!("Skills: {}", job.skills.join(", "));
            }
            if let Some(posted) = &job.posted_date {
                println!("Posted: {}", posted);
            }
            if board.has_applied(job.id) {
                println!("(applied)");
            }
            if board.is_saved(job.id) {
                println!("(saved)");
            }
            if !job.description.is_empty() {
                println!("\n--- Description ---\n{}", textwrap::fill(&job.description, 80));
            }
        }

        Commands::Post {
            title,
            company,
            location,
            salary,
            experience,
            description,
            job_type,
            skills,
        } => {
            let job = board.post_job(&JobForm {
                title,
                company,
                location,
                salary,
                experience_range: experience,
                description,
                job_type,
                skills,
            })?;
            println!("Posted job #{} ({} at {})", job.id, job.title, job.company);
        }

        Commands::EditJob {
            id,
            title,
            location,
            salary,
            experience,
            description,
            job_type,
            skills,
        } => {
            let job = board.edit_job(
                id,
                &JobPatch {
                    title,
                    location,
                    salary,
                    experience_range: experience,
                    description,
                    job_type,
                    skills,
                },
            )?;
            println!("Updated job #{}.", job.id);
        }

        Commands::Status { id, status } => {
            let job = match status {
                Some(status) => board.set_job_status(id, status)?,
                None => board.toggle_job_status(id)?,
            };
            println!("Job #{} is now {}.", job.id, job.status);
        }

        Commands::DeleteJob { id } => {
            let job = board.delete_job(id)?;
            println!("Deleted job #{} ({}).", job.id, job.title);
        }

        Commands::Apply { id } => match board.apply(id)? {
            ApplyOutcome::Applied(app) => {
                println!("Applied to {} at {}.", app.job_title, app.company)
            }
            ApplyOutcome::AlreadyApplied(app) => println!(
                "You already applied to {} on {}.",
                app.job_title, app.applied_date
            ),
        },

        Commands::Withdraw { id } => {
            if board.withdraw(id)? {
                println!("Withdrew your application to job #{}.", id);
            } else {
                println!("You have not applied to job #{}.", id);
            }
        }

        Commands::Applications => {
            let applications = board.applications_for_view()?;
            if applications.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<14} {:<14} {:<12} {:<26} {:<18} {:<12}",
                    "JOB", "USER", "STATUS", "TITLE", "APPLICANT", "APPLIED"
                );
                println!("{}", "-".repeat(100));
                for app in applications {
                    println!(
                        "{:<14} {:<14} {:<12} {:<26} {:<18} {:<12}",
                        app.job_id,
                        app.user_id,
                        app.status,
                        truncate(&app.job_title, 24),
                        truncate(app.applicant_name.as_deref().unwrap_or("-"), 16),
                        app.applied_date
                    );
                }
            }
        }

        Commands::Review {
            job_id,
            user_id,
            status,
        } => {
            let app = board.review_application(job_id, user_id, status)?;
            println!(
                "Application of user #{} to job #{} is now {}.",
                app.user_id, app.job_id, app.status
            );
        }

        Commands::Save { id } => {
            if board.save_job(id)? {
                println!("Saved job #{}.", id);
            } else {
                println!("Job #{} was already saved.", id);
            }
        }

        Commands::Unsave { id } => {
            if board.unsave_job(id)? {
                println!("Removed job #{} from saved jobs.", id);
            } else {
                println!("Job #{} was not saved.", id);
            }
        }

        Commands::Saved => {
            let saved = board.saved_jobs()?;
            if saved.is_empty() {
                println!("No saved jobs.");
            } else {
                println!(
                    "{:<14} {:<28} {:<18} {:<14} {:<12}",
                    "JOB", "TITLE", "COMPANY", "SALARY", "SAVED"
                );
                println!("{}", "-".repeat(90));
                for job in saved {
                    println!(
                        "{:<14} {:<28} {:<18} {:<14} {:<12}",
                        job.job_id,
                        truncate(&job.title, 26),
                        truncate(&job.company, 16),
                        truncate(&job.salary, 12),
                        job.saved_date
                    );
                }
            }
        }

        Commands::Users { command } => match command {
            UserCommands::List { user_type } => {
                let users = board.directory(user_type)?;
                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!("{:<14} {:<14} {:<24} {:<30}", "ID", "TYPE", "NAME", "EMAIL");
                    println!("{}", "-".repeat(84));
                    for user in users {
                        println!(
                            "{:<14} {:<14} {:<24} {:<30}",
                            user.id,
                            user.user_type,
                            truncate(user.display_name(), 22),
                            truncate(&user.email, 28)
                        );
                    }
                }
            }

            UserCommands::Delete { id } => {
                let user = board.delete_user(id)?;
                println!("Deleted user #{} ({}).", user.id, user.email);
            }

            UserCommands::SetType { id, user_type } => {
                let user = board.set_user_type(id, user_type)?;
                println!("User #{} is now {}.", user.id, user.user_type);
            }
        },

        Commands::Companies => {
            let companies = board.companies()?;
            if companies.is_empty() {
                println!("No companies registered.");
            } else {
                println!("{:<24} {:<30} {:<14} {:<20}", "NAME", "EMAIL", "CONTACT", "LOCATION");
                println!("{}", "-".repeat(88));
                for company in companies {
                    println!(
                        "{:<24} {:<30} {:<14} {:<20}",
                        truncate(&company.name, 22),
                        truncate(&company.email, 28),
                        company.contact,
                        truncate(company.location.as_deref().unwrap_or("-"), 18)
                    );
                }
            }
        }

        Commands::Dashboard => {
            let stats = board.stats()?;
            let ctx = board.context();
            if ctx.is(UserType::Applicant) {
                println!("Open jobs:     {}", stats.active_jobs);
                println!("Applications:  {}", stats.applications);
                println!("  Shortlisted: {}", stats.shortlisted);
                println!("  Hired:       {}", stats.hired);
                println!("Saved jobs:    {}", stats.saved_jobs);
            } else {
                println!("Jobs:          {} ({} open)", stats.jobs, stats.active_jobs);
                println!("Applications:  {}", stats.applications);
                println!("  Shortlisted: {}", stats.shortlisted);
                println!("  Hired:       {}", stats.hired);
                if ctx.user_type().is_some_and(|t| t.can_view_directory()) {
                    println!("Users:         {}", stats.users);
                    println!("Companies:     {}", stats.companies);
                    println!("Saved jobs:    {}", stats.saved_jobs);
                }
            }
        }

        Commands::Suggest { prefix, limit } => {
            for title in board.suggestions(&prefix, limit) {
                println!("{}", title);
            }
        }

        Commands::Browse { title } => {
            tui::run_browse(board, title.as_deref())?;
        }
    }

    Ok(())
}

fn print_jobs(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }
    println!(
        "{:<14} {:<9} {:<28} {:<18} {:<14} {:>10}",
        "ID", "STATUS", "TITLE", "COMPANY", "LOCATION", "SALARY"
    );
    println!("{}", "-".repeat(98));
    for job in jobs {
        println!(
            "{:<14} {:<9} {:<28} {:<18} {:<14} {:>10}",
            job.id,
            job.status,
            truncate(&job.title, 26),
            truncate(&job.company, 16),
            truncate(&job.location, 12),
            truncate(&job.salary, 10)
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

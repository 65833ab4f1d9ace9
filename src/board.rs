use std::rc::Rc;
use tracing::{info, warn};

use crate::config::{Config, RoleTable};
use crate::error::{BoardError, BoardResult, FieldErrors, StoreError};
use crate::filter::JobFilter;
use crate::models::{
    today, Application, ApplicationStatus, Company, Job, JobStatus, SavedJob, User, UserType,
};
use crate::repo::{ApplicationRepo, ApplyOutcome, CompanyRepo, JobRepo, SavedJobRepo, UserRepo};
use crate::search::SearchHistory;
use crate::session::{SessionContext, SessionService};
use crate::store::{SharedStore, SqliteStore};
use crate::validate::{
    validate_applicant, validate_company, validate_job, validate_job_patch, validate_profile,
    ApplicantForm, CompanyForm, JobForm, JobPatch, ProfilePatch,
};

const APPLICANTS: &[UserType] = &[UserType::Applicant];

const JOB_MANAGERS: &[UserType] = &[
    UserType::Recruiter,
    UserType::Admin,
    UserType::Hr,
    UserType::HrManager,
    UserType::HrRecruiter,
];

const PRIVILEGED: &[UserType] = &[
    UserType::Admin,
    UserType::Hr,
    UserType::HrManager,
    UserType::HrRecruiter,
];

const DIRECTORY: &[UserType] = &[UserType::Admin, UserType::Hr, UserType::HrManager];

#[derive(Debug, Clone)]
enum Scope {
    All,
    Company(Company),
}

impl Scope {
    fn allows(&self, job: &Job) -> bool {
        match self {
            Scope::All => true,
            Scope::Company(company) => job.owned_by(company),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardStats {
    pub jobs: usize,
    pub active_jobs: usize,
    pub applications: usize,
    pub shortlisted: usize,
    pub hired: usize,
    pub saved_jobs: usize,
    pub users: usize,
    pub companies: usize,
}

pub struct Board {
    store: SharedStore,
    users: UserRepo,
    companies: CompanyRepo,
    jobs: JobRepo,
    applications: ApplicationRepo,
    saved: SavedJobRepo,
    session: SessionService,
    history: SearchHistory,
}

impl Board {
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let store = SqliteStore::open_default(config)?;
        info!(path = %store.path().display(), "opened board");
        Ok(Self::new(Rc::new(store), config.roles()))
    }

    pub fn new(store: SharedStore, roles: RoleTable) -> Self {
        let users = UserRepo::new(store.clone());
        Self {
            session: SessionService::new(store.clone(), users.clone(), roles),
            companies: CompanyRepo::new(store.clone()),
            jobs: JobRepo::new(store.clone()),
            applications: ApplicationRepo::new(store.clone()),
            saved: SavedJobRepo::new(store.clone()),
            history: SearchHistory::new(),
            users,
            store,
        }
    }

    pub fn session(&self) -> &SessionService {
        &self.session
    }

    pub fn history(&self) -> &SearchHistory {
        &self.history
    }

    pub fn context(&self) -> SessionContext {
        self.session.context()
    }

    // --- Registration ---

    pub fn register_applicant(&self, form: &ApplicantForm) -> BoardResult<User> {
        validate_applicant(form)?;
        let email = form.email.trim();
        if self.users.find_by_email(email).is_some() {
            return Err(BoardError::Duplicate {
                field: "email",
                value: email.to_string(),
            });
        }

        let user = self.users.insert(User {
            id: 0,
            name: form.name.trim().to_string(),
            email: email.to_string(),
            password: form.password.clone(),
            user_type: UserType::Applicant,
            contact: non_blank(&form.contact),
            degree: non_blank(&form.degree),
            experience: non_blank(&form.experience),
            location: non_blank(&form.location),
            resume: None,
            photo: None,
        })?;
        info!(user_id = user.id, "applicant registered");
        self.session.start(user.clone())?;
        self.session.clear_pending_signup()?;
        Ok(user)
    }

    pub fn register_company(&self, form: &CompanyForm) -> BoardResult<(Company, User)> {
        validate_company(form)?;
        let email = form.email.trim();
        if self.companies.find_by_email(email).is_some()
            || self.users.find_by_email_ignore_case(email).is_some()
        {
            return Err(BoardError::Duplicate {
                field: "email",
                value: email.to_string(),
            });
        }
        if self.companies.find_by_contact(&form.contact).is_some() {
            return Err(BoardError::Duplicate {
                field: "contact",
                value: form.contact.trim().to_string(),
            });
        }

        let company = Company {
            name: form.name.trim().to_string(),
            email: email.to_string(),
            contact: form.contact.trim().to_string(),
            password: form.password.clone(),
            location: non_blank(&form.location),
            website: non_blank(&form.website),
            description: non_blank(&form.description),
        };
        self.companies.upsert(company.clone())?;

        let inserted = self.users.insert(User {
            id: 0,
            name: company.name.clone(),
            email: company.email.clone(),
            password: company.password.clone(),
            user_type: UserType::Recruiter,
            contact: Some(company.contact.clone()),
            degree: None,
            experience: None,
            location: company.location.clone(),
            resume: None,
            photo: None,
        });
        let user = match inserted {
            Ok(user) => user,
            Err(e) => {
                // Never leave a company without its recruiter.
                if let Err(undo) = self.companies.delete(&company.email) {
                    warn!(error = %undo, company = %company.name, "failed to roll back company");
                }
                return Err(e.into());
            }
        };
        info!(user_id = user.id, company = %company.name, "company registered");
        self.session.start(user.clone())?;
        self.session.clear_pending_signup()?;
        Ok((company, user))
    }

    // --- Jobs ---

    fn manager_scope(&self) -> BoardResult<(User, Scope)> {
        let ctx = self.context();
        let user = ctx.require(JOB_MANAGERS)?.clone();
        if user.user_type != UserType::Recruiter {
            return Ok((user, Scope::All));
        }
        let company = self
            .companies
            .find_by_email(&user.email)
            .ok_or_else(|| BoardError::not_found("company", &user.email))?;
        Ok((user, Scope::Company(company)))
    }

    fn managed_job(&self, id: i64) -> BoardResult<Job> {
        let (_, scope) = self.manager_scope()?;
        let job = self.job(id)?;
        if !scope.allows(&job) {
            return Err(BoardError::Unauthorized {
                required: PRIVILEGED.to_vec(),
            });
        }
        Ok(job)
    }

    pub fn job(&self, id: i64) -> BoardResult<Job> {
        self.jobs.get(id).ok_or_else(|| BoardError::not_found("job", id))
    }

    /// Recruiters post for their own company. Everyone else with job rights
    /// names the company on the form.
    pub fn post_job(&self, form: &JobForm) -> BoardResult<Job> {
        let (user, scope) = self.manager_scope()?;
        validate_job(form)?;

        let (company, company_email) = match scope {
            Scope::Company(company) => (company.name, Some(company.email)),
            Scope::All => match form.company.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => (name.to_string(), None),
                _ => {
                    let mut errors = FieldErrors::new();
                    errors.add("company", "Company is required");
                    return Err(BoardError::Validation(errors));
                }
            },
        };

        let job = self.jobs.insert(Job {
            id: 0,
            title: form.title.trim().to_string(),
            company,
            company_email,
            location: form.location.trim().to_string(),
            salary: form.salary.trim().to_string(),
            experience_range: form.experience_range.trim().to_string(),
            status: JobStatus::Active,
            description: form.description.trim().to_string(),
            job_type: non_blank(&form.job_type),
            skills: clean_skills(&form.skills),
            posted_date: Some(today()),
        })?;
        info!(job_id = job.id, posted_by = user.id, company = %job.company, "job posted");
        Ok(job)
    }

    pub fn edit_job(&self, id: i64, patch: &JobPatch) -> BoardResult<Job> {
        self.managed_job(id)?;
        validate_job_patch(patch)?;
        let updated = self.jobs.update(id, |job| {
            if let Some(title) = &patch.title {
                job.title = title.trim().to_string();
            }
            if let Some(location) = &patch.location {
                job.location = location.trim().to_string();
            }
            if let Some(salary) = &patch.salary {
                job.salary = salary.trim().to_string();
            }
            if let Some(experience) = &patch.experience_range {
                job.experience_range = experience.trim().to_string();
            }
            if let Some(description) = &patch.description {
                job.description = description.trim().to_string();
            }
            if let Some(job_type) = &patch.job_type {
                job.job_type = non_blank(&Some(job_type.clone()));
            }
            if let Some(skills) = &patch.skills {
                job.skills = clean_skills(skills);
            }
        })?;
        updated.ok_or_else(|| BoardError::not_found("job", id))
    }

    pub fn set_job_status(&self, id: i64, status: JobStatus) -> BoardResult<Job> {
        self.managed_job(id)?;
        let job = self
            .jobs
            .set_status(id, status)?
            .ok_or_else(|| BoardError::not_found("job", id))?;
        info!(job_id = id, status = %job.status, "job status changed");
        Ok(job)
    }

    pub fn toggle_job_status(&self, id: i64) -> BoardResult<Job> {
        let current = self.managed_job(id)?;
        self.set_job_status(id, current.status.toggled())
    }

    /// Applications and saved copies of the job are left in place.
    pub fn delete_job(&self, id: i64) -> BoardResult<Job> {
        self.managed_job(id)?;
        let job = self
            .jobs
            .delete(id)?
            .ok_or_else(|| BoardError::not_found("job", id))?;
        info!(job_id = id, "job deleted");
        Ok(job)
    }

    /// Jobs the viewer may see that match `filter`. Applicants and visitors
    /// only see open jobs; recruiters see their own company's, or open jobs
    /// when no company is on record for them.
    pub fn browse_jobs(&self, filter: &JobFilter) -> Vec<Job> {
        let ctx = self.context();
        let jobs = match ctx.user() {
            Some(user) if user.user_type.can_manage_jobs() => match self.manager_scope() {
                Ok((_, Scope::All)) => self.jobs.list(),
                Ok((_, Scope::Company(company))) => self.jobs.by_company(&company),
                Err(_) => self.jobs.active(),
            },
            _ => self.jobs.active(),
        };
        filter.apply(&jobs)
    }

    pub fn search(&self, term: &str) -> Vec<Job> {
        self.history.record(term);
        self.browse_jobs(&JobFilter {
            title: Some(term.to_string()),
            ..Default::default()
        })
    }

    pub fn suggestions(&self, prefix: &str, limit: usize) -> Vec<String> {
        self.history.suggestions(prefix, limit)
    }

    // --- Applications ---

    pub fn apply(&self, job_id: i64) -> BoardResult<ApplyOutcome> {
        let ctx = self.context();
        let user = ctx.require(APPLICANTS)?;
        let job = self.job(job_id)?;
        if !job.is_active() {
            return Err(BoardError::JobClosed(job_id));
        }
        let outcome = self.applications.apply(Application {
            job_id,
            user_id: user.id,
            job_title: job.title,
            company: job.company,
            applied_date: today(),
            status: ApplicationStatus::Applied,
            applicant_name: Some(user.name.clone()),
            applicant_email: Some(user.email.clone()),
        })?;
        Ok(outcome)
    }

    pub fn has_applied(&self, job_id: i64) -> bool {
        self.context()
            .user()
            .is_some_and(|u| self.applications.has_applied(u.id, job_id))
    }

    pub fn withdraw(&self, job_id: i64) -> BoardResult<bool> {
        let ctx = self.context();
        let user = ctx.require(APPLICANTS)?;
        Ok(self.applications.withdraw(job_id, user.id)?)
    }

    /// Applicants see their own applications, recruiters those for their
    /// company, everyone else with review rights sees all of them.
    pub fn applications_for_view(&self) -> BoardResult<Vec<Application>> {
        let ctx = self.context();
        let user = ctx.require_login()?;
        if !user.user_type.can_review_applications() {
            return Ok(self.applications.by_user(user.id));
        }
        match self.manager_scope()?.1 {
            Scope::All => Ok(self.applications.list()),
            Scope::Company(company) => {
                let ids: Vec<i64> = self.jobs.by_company(&company).iter().map(|j| j.id).collect();
                Ok(self.applications.by_company(&company, &ids))
            }
        }
    }

    pub fn review_application(
        &self,
        job_id: i64,
        user_id: i64,
        status: ApplicationStatus,
    ) -> BoardResult<Application> {
        let (reviewer, scope) = self.manager_scope()?;
        if let Scope::Company(company) = &scope {
            let app_company = self
                .applications
                .by_job(job_id)
                .into_iter()
                .find(|a| a.user_id == user_id)
                .map(|a| a.company);
            let owned = match self.jobs.get(job_id) {
                Some(job) => job.owned_by(company),
                None => app_company.is_some_and(|c| c.trim().eq_ignore_ascii_case(company.name.trim())),
            };
            if !owned {
                return Err(BoardError::Unauthorized {
                    required: PRIVILEGED.to_vec(),
                });
            }
        }
        let app = self
            .applications
            .set_status(job_id, user_id, status)?
            .ok_or_else(|| BoardError::not_found("application", format!("{}/{}", job_id, user_id)))?;
        info!(job_id, user_id, status = %status, reviewer = reviewer.id, "application reviewed");
        Ok(app)
    }

    // --- Saved jobs ---

    pub fn save_job(&self, job_id: i64) -> BoardResult<bool> {
        let ctx = self.context();
        let user = ctx.require(APPLICANTS)?;
        let job = self.job(job_id)?;
        Ok(self.saved.save_job(SavedJob::snapshot(user.id, &job, today()))?)
    }

    pub fn unsave_job(&self, job_id: i64) -> BoardResult<bool> {
        let ctx = self.context();
        let user = ctx.require(APPLICANTS)?;
        Ok(self.saved.unsave(user.id, job_id)?)
    }

    pub fn saved_jobs(&self) -> BoardResult<Vec<SavedJob>> {
        let ctx = self.context();
        let user = ctx.require(APPLICANTS)?;
        Ok(self.saved.by_user(user.id))
    }

    pub fn is_saved(&self, job_id: i64) -> bool {
        self.context()
            .user()
            .is_some_and(|u| self.saved.is_saved(u.id, job_id))
    }

    // --- Profile and directory ---

    pub fn update_profile(&self, patch: &ProfilePatch) -> BoardResult<User> {
        let ctx = self.context();
        let user = ctx.require_login()?;
        validate_profile(patch)?;
        let updated = self
            .users
            .update(user.id, |u| {
                if let Some(name) = &patch.name {
                    u.name = name.trim().to_string();
                }
                set_optional(&mut u.contact, &patch.contact);
                set_optional(&mut u.degree, &patch.degree);
                set_optional(&mut u.experience, &patch.experience);
                set_optional(&mut u.location, &patch.location);
                set_optional(&mut u.resume, &patch.resume);
                set_optional(&mut u.photo, &patch.photo);
            })?
            // Role accounts have no stored profile.
            .ok_or_else(|| BoardError::not_found("user", user.id))?;
        self.session.refresh(updated.clone())?;
        info!(user_id = updated.id, "profile updated");
        Ok(updated)
    }

    pub fn directory(&self, user_type: Option<UserType>) -> BoardResult<Vec<User>> {
        self.context().require(DIRECTORY)?;
        Ok(match user_type {
            Some(user_type) => self.users.by_type(user_type),
            None => self.users.list(),
        })
    }

    /// Removes the account only. Their applications and saved jobs stay.
    pub fn delete_user(&self, id: i64) -> BoardResult<User> {
        self.context().require(DIRECTORY)?;
        let user = self
            .users
            .delete(id)?
            .ok_or_else(|| BoardError::not_found("user", id))?;
        info!(user_id = id, email = %user.email, "user deleted");
        Ok(user)
    }

    pub fn set_user_type(&self, id: i64, user_type: UserType) -> BoardResult<User> {
        self.context().require(DIRECTORY)?;
        let user = self
            .users
            .update(id, |u| u.user_type = user_type)?
            .ok_or_else(|| BoardError::not_found("user", id))?;
        info!(user_id = id, user_type = %user_type, "user type changed");
        Ok(user)
    }

    pub fn companies(&self) -> BoardResult<Vec<Company>> {
        self.context().require(DIRECTORY)?;
        Ok(self.companies.list())
    }

    pub fn stats(&self) -> BoardResult<BoardStats> {
        let ctx = self.context();
        let user = ctx.require_login()?;
        if user.user_type == UserType::Applicant {
            let applications = self.applications.by_user(user.id);
            return Ok(BoardStats {
                jobs: self.jobs.active().len(),
                active_jobs: self.jobs.active().len(),
                shortlisted: count_status(&applications, ApplicationStatus::Shortlisted),
                hired: count_status(&applications, ApplicationStatus::Hired),
                applications: applications.len(),
                saved_jobs: self.saved.by_user(user.id).len(),
                ..Default::default()
            });
        }

        let jobs = self.browse_jobs(&JobFilter::default());
        let applications = self.applications_for_view()?;
        let mut stats = BoardStats {
            jobs: jobs.len(),
            active_jobs: jobs.iter().filter(|j| j.is_active()).count(),
            shortlisted: count_status(&applications, ApplicationStatus::Shortlisted),
            hired: count_status(&applications, ApplicationStatus::Hired),
            applications: applications.len(),
            ..Default::default()
        };
        if user.user_type.can_view_directory() {
            stats.users = self.users.list().len();
            stats.companies = self.companies.list().len();
            stats.saved_jobs = self.saved.list().len();
        }
        Ok(stats)
    }

    /// Picks up commits made by another process. Returns true when there
    /// were any, so callers know to re-read.
    pub fn poll_external(&self) -> Result<bool, StoreError> {
        if !self.store.changed_externally()? {
            return Ok(false);
        }
        self.session.sync_external();
        Ok(true)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// An empty string clears the field.
fn set_optional(field: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        *field = non_blank(value);
    }
}

fn clean_skills(skills: &[String]) -> Vec<String> {
    skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn count_status(applications: &[Application], status: ApplicationStatus) -> usize {
    applications.iter().filter(|a| a.status == status).count()
}

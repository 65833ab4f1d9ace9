use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Applicant,
    Recruiter,
    Admin,
    Hr,
    HrManager,
    HrRecruiter,
}

impl UserType {
    pub const ALL: [UserType; 6] = [
        UserType::Applicant,
        UserType::Recruiter,
        UserType::Admin,
        UserType::Hr,
        UserType::HrManager,
        UserType::HrRecruiter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Applicant => "applicant",
            UserType::Recruiter => "recruiter",
            UserType::Admin => "admin",
            UserType::Hr => "hr",
            UserType::HrManager => "hr_manager",
            UserType::HrRecruiter => "hr_recruiter",
        }
    }

    /// Roles that log in from the configured role table.
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            UserType::Admin | UserType::Hr | UserType::HrManager | UserType::HrRecruiter
        )
    }

    pub fn can_manage_jobs(&self) -> bool {
        !matches!(self, UserType::Applicant)
    }

    pub fn can_review_applications(&self) -> bool {
        !matches!(self, UserType::Applicant)
    }

    pub fn can_view_directory(&self) -> bool {
        matches!(self, UserType::Admin | UserType::Hr | UserType::HrManager)
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        UserType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown user type '{}' (expected one of: applicant, recruiter, admin, hr, hr_manager, hr_recruiter)",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub user_type: UserType,
    #[serde(default, alias = "phone", skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(alias = "companyName")]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Active,
    Inactive,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Inactive => "inactive",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            JobStatus::Active => JobStatus::Inactive,
            JobStatus::Inactive => JobStatus::Active,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(JobStatus::Active),
            "inactive" => Ok(JobStatus::Inactive),
            _ => Err(format!("unknown job status '{}' (expected active or inactive)", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_email: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub salary: String, // display string, e.g. "₹10L - ₹15L"
    #[serde(default, alias = "experience")]
    pub experience_range: String, // "2-5" or "5+"
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<String>,
}

impl Job {
    pub fn is_active(&self) -> bool {
        self.status == JobStatus::Active
    }

    /// Jobs belong to a company by matching strings, not by id. The email
    /// wins when the job carries one.
    pub fn owned_by(&self, company: &Company) -> bool {
        match &self.company_email {
            Some(email) => email.eq_ignore_ascii_case(&company.email),
            None => self.company.trim().eq_ignore_ascii_case(company.name.trim()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Reviewed,
    Shortlisted,
    Rejected,
    Hired,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Reviewed => "reviewed",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Hired => "hired",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "applied" | "pending" => Ok(ApplicationStatus::Applied),
            "reviewed" => Ok(ApplicationStatus::Reviewed),
            "shortlisted" => Ok(ApplicationStatus::Shortlisted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "hired" => Ok(ApplicationStatus::Hired),
            _ => Err(format!("unknown application status '{}'", s)),
        }
    }
}

// Stored statuses are free text in older data; anything unknown reads as applied.
impl Serialize for ApplicationStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ApplicationStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub job_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub applied_date: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_email: Option<String>,
}

/// A copy of the job as it looked when it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJob {
    pub user_id: i64,
    pub job_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub salary: String,
    #[serde(default)]
    pub experience_range: String,
    #[serde(default)]
    pub saved_date: String,
}

impl SavedJob {
    pub fn snapshot(user_id: i64, job: &Job, saved_date: String) -> Self {
        Self {
            user_id,
            job_id: job.id,
            title: job.title.clone(),
            company: job.company.clone(),
            location: job.location.clone(),
            salary: job.salary.clone(),
            experience_range: job.experience_range.clone(),
            saved_date,
        }
    }
}

/// Today's date in the format stored on applications and saved jobs.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

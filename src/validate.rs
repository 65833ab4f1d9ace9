//! Form input and the field-level checks run before anything is stored.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{BoardResult, FieldErrors};
use crate::filter::parse_leading_number;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

const MIN_PASSWORD_LEN: usize = 6;
const CONTACT_DIGITS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct ApplicantForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub contact: Option<String>,
    pub degree: Option<String>,
    pub experience: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompanyForm {
    pub name: String,
    pub email: String,
    pub contact: String,
    pub password: String,
    pub location: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct JobForm {
    pub title: String,
    /// Only used by roles that post on behalf of a company.
    pub company: Option<String>,
    pub location: String,
    pub salary: String,
    pub experience_range: String,
    pub description: String,
    pub job_type: Option<String>,
    pub skills: Vec<String>,
}

/// Changes to a posted job; `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub title: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub experience_range: Option<String>,
    pub description: Option<String>,
    pub job_type: Option<String>,
    pub skills: Option<Vec<String>>,
}

/// Changes to the logged-in user's profile.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub degree: Option<String>,
    pub experience: Option<String>,
    pub location: Option<String>,
    pub resume: Option<String>,
    pub photo: Option<String>,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email.trim())
}

pub fn is_valid_contact(contact: &str) -> bool {
    let compact: String = contact.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    compact.len() == CONTACT_DIGITS && compact.chars().all(|c| c.is_ascii_digit())
}

fn require(errors: &mut FieldErrors, field: &'static str, value: &str, label: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, format!("{} is required", label));
        false
    } else {
        true
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if require(errors, "email", email, "Email") && !is_valid_email(email) {
        errors.add("email", "Enter a valid email address");
    }
}

fn check_password(errors: &mut FieldErrors, password: &str) {
    if require(errors, "password", password, "Password") && password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        );
    }
}

fn check_contact(errors: &mut FieldErrors, contact: &str) {
    if !is_valid_contact(contact) {
        errors.add(
            "contact",
            format!("Contact number must be {} digits", CONTACT_DIGITS),
        );
    }
}

pub fn validate_applicant(form: &ApplicantForm) -> BoardResult<()> {
    let mut errors = FieldErrors::new();
    require(&mut errors, "name", &form.name, "Name");
    check_email(&mut errors, &form.email);
    check_password(&mut errors, &form.password);
    if let Some(contact) = form.contact.as_deref().filter(|c| !c.trim().is_empty()) {
        check_contact(&mut errors, contact);
    }
    errors.into_result()
}

pub fn validate_company(form: &CompanyForm) -> BoardResult<()> {
    let mut errors = FieldErrors::new();
    require(&mut errors, "name", &form.name, "Company name");
    check_email(&mut errors, &form.email);
    if require(&mut errors, "contact", &form.contact, "Contact number") {
        check_contact(&mut errors, &form.contact);
    }
    check_password(&mut errors, &form.password);
    errors.into_result()
}

pub fn validate_job(form: &JobForm) -> BoardResult<()> {
    let mut errors = FieldErrors::new();
    require(&mut errors, "title", &form.title, "Job title");
    require(&mut errors, "location", &form.location, "Location");
    check_job_numbers(&mut errors, Some(&form.salary), Some(&form.experience_range));
    errors.into_result()
}

pub fn validate_job_patch(patch: &JobPatch) -> BoardResult<()> {
    let mut errors = FieldErrors::new();
    if let Some(title) = &patch.title {
        require(&mut errors, "title", title, "Job title");
    }
    if let Some(location) = &patch.location {
        require(&mut errors, "location", location, "Location");
    }
    check_job_numbers(&mut errors, patch.salary.as_deref(), patch.experience_range.as_deref());
    errors.into_result()
}

pub fn validate_profile(patch: &ProfilePatch) -> BoardResult<()> {
    let mut errors = FieldErrors::new();
    if let Some(name) = &patch.name {
        require(&mut errors, "name", name, "Name");
    }
    if let Some(contact) = patch.contact.as_deref().filter(|c| !c.trim().is_empty()) {
        check_contact(&mut errors, contact);
    }
    errors.into_result()
}

// Salary and experience are display strings, but filters need a number in them.
fn check_job_numbers(errors: &mut FieldErrors, salary: Option<&str>, experience: Option<&str>) {
    if let Some(salary) = salary {
        if require(errors, "salary", salary, "Salary") && !salary.chars().any(|c| c.is_ascii_digit()) {
            errors.add("salary", "Salary must contain an amount, e.g. ₹12L");
        }
    }
    if let Some(experience) = experience {
        if require(errors, "experienceRange", experience, "Experience")
            && !experience.chars().any(|c| c.is_ascii_digit())
        {
            errors.add("experienceRange", "Experience must look like 2-5 or 5+");
        } else if parse_leading_number(experience) > 60 {
            errors.add("experienceRange", "Experience is out of range");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoardError;

    fn field_errors(result: BoardResult<()>) -> FieldErrors {
        match result {
            Err(BoardError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    fn company_form() -> CompanyForm {
        CompanyForm {
            name: "Acme".into(),
            email: "hr@acme.com".into(),
            contact: "98765 43210".into(),
            password: "secret1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_email_and_contact_rules() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a b@x.com"));

        assert!(is_valid_contact("9876543210"));
        assert!(is_valid_contact("98765-43210"));
        assert!(!is_valid_contact("98765"));
        assert!(!is_valid_contact("98765abcde"));
    }

    #[test]
    fn test_validate_company() {
        assert!(validate_company(&company_form()).is_ok());

        let form = CompanyForm {
            email: "not-an-email".into(),
            contact: "123".into(),
            password: "abc".into(),
            ..company_form()
        };
        let errors = field_errors(validate_company(&form));
        assert_eq!(errors.get("email"), Some("Enter a valid email address"));
        assert_eq!(errors.get("contact"), Some("Contact number must be 10 digits"));
        assert_eq!(errors.get("password"), Some("Password must be at least 6 characters"));
        assert_eq!(errors.get("name"), None);
    }

    #[test]
    fn test_validate_applicant_optional_contact() {
        let form = ApplicantForm {
            name: "Asha".into(),
            email: "asha@x.com".into(),
            password: "secret1".into(),
            contact: Some("".into()),
            ..Default::default()
        };
        assert!(validate_applicant(&form).is_ok());

        let errors = field_errors(validate_applicant(&ApplicantForm::default()));
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(errors.get("password"), Some("Password is required"));
    }

    #[test]
    fn test_validate_job() {
        let form = JobForm {
            title: "Rust Engineer".into(),
            location: "Pune".into(),
            salary: "₹12L".into(),
            experience_range: "2-5".into(),
            ..Default::default()
        };
        assert!(validate_job(&form).is_ok());

        let errors = field_errors(validate_job(&JobForm {
            salary: "Competitive".into(),
            experience_range: "senior".into(),
            ..form.clone()
        }));
        assert!(errors.get("salary").is_some());
        assert!(errors.get("experienceRange").is_some());

        assert!(validate_job_patch(&JobPatch::default()).is_ok());
        assert!(validate_profile(&ProfilePatch {
            contact: Some(" ".into()),
            ..Default::default()
        })
        .is_ok());
        assert!(validate_job_patch(&JobPatch {
            title: Some(" ".into()),
            ..Default::default()
        })
        .is_err());
    }
}

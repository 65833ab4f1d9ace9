use tracing::info;

use crate::error::StoreError;
use crate::models::{Application, ApplicationStatus, Company};
use crate::store::SharedStore;

use super::{Collection, Record};

pub const APPLICATIONS_KEY: &str = "jobApplications";

impl Record for Application {
    // At most one application per (job, user).
    type Id = (i64, i64);

    fn id(&self) -> (i64, i64) {
        (self.job_id, self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied(Application),
    AlreadyApplied(Application),
}

impl ApplyOutcome {
    pub fn application(&self) -> &Application {
        match self {
            ApplyOutcome::Applied(app) | ApplyOutcome::AlreadyApplied(app) => app,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }
}

#[derive(Clone)]
pub struct ApplicationRepo {
    applications: Collection<Application>,
}

impl ApplicationRepo {
    pub fn new(store: SharedStore) -> Self {
        Self {
            applications: Collection::new(store, APPLICATIONS_KEY),
        }
    }

    pub fn list(&self) -> Vec<Application> {
        self.applications.list()
    }

    /// Records the application unless one already exists for the same job
    /// and user. The check and the write happen in one store update.
    pub fn apply(&self, application: Application) -> Result<ApplyOutcome, StoreError> {
        let outcome = self.applications.modify(move |index| {
            match index.get(&application.id()) {
                Some(existing) => ApplyOutcome::AlreadyApplied(existing.clone()),
                None => {
                    index.upsert(application.clone());
                    ApplyOutcome::Applied(application)
                }
            }
        })?;
        if outcome.is_new() {
            let app = outcome.application();
            info!(job_id = app.job_id, user_id = app.user_id, "application recorded");
        }
        Ok(outcome)
    }

    pub fn has_applied(&self, user_id: i64, job_id: i64) -> bool {
        self.applications.get(&(job_id, user_id)).is_some()
    }

    pub fn by_user(&self, user_id: i64) -> Vec<Application> {
        self.applications.filter(|a| a.user_id == user_id)
    }

    pub fn by_job(&self, job_id: i64) -> Vec<Application> {
        self.applications.filter(|a| a.job_id == job_id)
    }

    pub fn by_jobs(&self, job_ids: &[i64]) -> Vec<Application> {
        self.applications.filter(|a| job_ids.contains(&a.job_id))
    }

    /// Applications to `company`'s jobs. Older applications only carry the
    /// company name, so those ids are matched as well as the name.
    pub fn by_company(&self, company: &Company, job_ids: &[i64]) -> Vec<Application> {
        let name = company.name.trim();
        self.applications.filter(|a| {
            job_ids.contains(&a.job_id) || a.company.trim().eq_ignore_ascii_case(name)
        })
    }

    pub fn set_status(
        &self,
        job_id: i64,
        user_id: i64,
        status: ApplicationStatus,
    ) -> Result<Option<Application>, StoreError> {
        self.applications.modify(|index| {
            index.get_mut(&(job_id, user_id)).map(|app| {
                app.status = status;
                app.clone()
            })
        })
    }

    pub fn withdraw(&self, job_id: i64, user_id: i64) -> Result<bool, StoreError> {
        Ok(self.applications.delete(&(job_id, user_id))?.is_some())
    }

    pub fn save(&self, applications: &[Application]) -> Result<(), StoreError> {
        self.applications.save(applications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::rc::Rc;

    fn test_repo() -> (Rc<MemoryStore>, ApplicationRepo) {
        let store = Rc::new(MemoryStore::new());
        let repo = ApplicationRepo::new(store.clone());
        (store, repo)
    }

    fn application(job_id: i64, user_id: i64) -> Application {
        Application {
            job_id,
            user_id,
            job_title: "Rust Engineer".to_string(),
            company: "Acme".to_string(),
            applied_date: "2026-10-19".to_string(),
            status: ApplicationStatus::Applied,
            applicant_name: None,
            applicant_email: None,
        }
    }

    #[test]
    fn test_apply_twice_creates_one_record() {
        let (_, repo) = test_repo();
        let first = repo.apply(application(10, 1)).unwrap();
        assert!(first.is_new());

        let mut again = application(10, 1);
        again.applied_date = "2026-10-20".to_string();
        let second = repo.apply(again).unwrap();
        assert!(matches!(second, ApplyOutcome::AlreadyApplied(_)));
        assert_eq!(second.application().applied_date, "2026-10-19");

        assert_eq!(repo.list().len(), 1);
        assert!(repo.has_applied(1, 10));
        assert!(!repo.has_applied(10, 1));
    }

    #[test]
    fn test_stored_duplicates_are_not_counted() {
        let (store, repo) = test_repo();
        store
            .set(
                APPLICATIONS_KEY,
                r#"[{"jobId": 10, "userId": 1, "status": "applied"},
                    {"jobId": 10, "userId": 1, "status": "applied"}]"#,
            )
            .unwrap();
        assert_eq!(repo.by_user(1).len(), 1);
        assert!(!repo.apply(application(10, 1)).unwrap().is_new());
    }

    #[test]
    fn test_filters_and_status() {
        let (_, repo) = test_repo();
        repo.apply(application(10, 1)).unwrap();
        repo.apply(application(11, 1)).unwrap();
        repo.apply(application(10, 2)).unwrap();

        assert_eq!(repo.by_user(1).len(), 2);
        assert_eq!(repo.by_job(10).len(), 2);
        assert_eq!(repo.by_jobs(&[11, 12]).len(), 1);

        let updated = repo
            .set_status(10, 2, ApplicationStatus::Shortlisted)
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, ApplicationStatus::Shortlisted);
        assert!(repo.set_status(99, 2, ApplicationStatus::Hired).unwrap().is_none());

        assert!(repo.withdraw(10, 1).unwrap());
        assert!(!repo.withdraw(10, 1).unwrap());
        assert_eq!(repo.list().len(), 2);
    }

    #[test]
    fn test_by_company_matches_ids_or_name() {
        let (_, repo) = test_repo();
        repo.apply(application(10, 1)).unwrap();
        let mut other = application(20, 1);
        other.company = "Globex".to_string();
        repo.apply(other).unwrap();

        let acme = Company {
            name: " acme".to_string(),
            email: "hr@acme.com".to_string(),
            contact: String::new(),
            password: String::new(),
            location: None,
            website: None,
            description: None,
        };
        assert_eq!(repo.by_company(&acme, &[]).len(), 1);
        assert_eq!(repo.by_company(&acme, &[20]).len(), 2);
    }
}

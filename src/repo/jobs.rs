use serde_json::Value;

use crate::error::StoreError;
use crate::models::{Company, Job, JobStatus};
use crate::store::SharedStore;

use super::{next_timestamp_id, Collection, Record};

pub const JOBS_KEY: &str = "jobs";

/// Forces a stored job's `status` to exactly "active" or "inactive".
/// Anything that is not some casing of "inactive" (absent, null, numbers,
/// typos) becomes "active". Returns true when the entry was rewritten.
pub fn normalize_status(raw: &mut Value) -> bool {
    let Some(obj) = raw.as_object_mut() else {
        return false;
    };
    let normalized = match obj.get("status") {
        Some(Value::String(s)) if s == "active" || s == "inactive" => return false,
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("inactive") => "inactive",
        _ => "active",
    };
    obj.insert("status".to_string(), Value::String(normalized.to_string()));
    true
}

impl Record for Job {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }

    fn normalize(raw: &mut Value) -> bool {
        normalize_status(raw)
    }
}

#[derive(Clone)]
pub struct JobRepo {
    jobs: Collection<Job>,
}

impl JobRepo {
    pub fn new(store: SharedStore) -> Self {
        Self {
            jobs: Collection::new(store, JOBS_KEY),
        }
    }

    pub fn list(&self) -> Vec<Job> {
        self.jobs.list()
    }

    pub fn active(&self) -> Vec<Job> {
        self.jobs.filter(|j| j.is_active())
    }

    pub fn get(&self, id: i64) -> Option<Job> {
        self.jobs.get(&id)
    }

    pub fn by_company(&self, company: &Company) -> Vec<Job> {
        self.jobs.filter(|j| j.owned_by(company))
    }

    /// Stores a new job under a fresh timestamp id and returns it.
    pub fn insert(&self, mut job: Job) -> Result<Job, StoreError> {
        self.jobs.modify(move |index| {
            job.id = next_timestamp_id(index.iter().map(|j| j.id));
            index.upsert(job.clone());
            job
        })
    }

    pub fn update(&self, id: i64, f: impl FnOnce(&mut Job)) -> Result<Option<Job>, StoreError> {
        self.jobs.modify(|index| {
            index.get_mut(&id).map(|job| {
                f(job);
                job.clone()
            })
        })
    }

    pub fn set_status(&self, id: i64, status: JobStatus) -> Result<Option<Job>, StoreError> {
        self.update(id, |job| job.status = status)
    }

    pub fn toggle_status(&self, id: i64) -> Result<Option<Job>, StoreError> {
        self.update(id, |job| job.status = job.status.toggled())
    }

    pub fn delete(&self, id: i64) -> Result<Option<Job>, StoreError> {
        self.jobs.delete(&id)
    }

    pub fn save(&self, jobs: &[Job]) -> Result<(), StoreError> {
        self.jobs.save(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::store::{KeyValueStore, MemoryStore};
    use serde_json::json;
    use std::rc::Rc;

    fn test_repo() -> (Rc<MemoryStore>, JobRepo) {
        let store = Rc::new(MemoryStore::new());
        let repo = JobRepo::new(store.clone());
        (store, repo)
    }

    fn sample_job(title: &str, company: &str) -> Job {
        Job {
            id: 0,
            title: title.to_string(),
            company: company.to_string(),
            company_email: None,
            location: "Bengaluru".to_string(),
            salary: "₹12L".to_string(),
            experience_range: "2-5".to_string(),
            status: JobStatus::Active,
            description: String::new(),
            job_type: None,
            skills: vec![],
            posted_date: None,
        }
    }

    #[test]
    fn test_normalize_status() {
        let mut ok = json!({"status": "inactive"});
        assert!(!normalize_status(&mut ok));

        let mut missing = json!({"id": 1});
        assert!(normalize_status(&mut missing));
        assert_eq!(missing["status"], "active");

        let mut shouting = json!({"status": " INACTIVE "});
        assert!(normalize_status(&mut shouting));
        assert_eq!(shouting["status"], "inactive");

        let mut garbled = json!({"status": 42});
        assert!(normalize_status(&mut garbled));
        assert_eq!(garbled["status"], "active");

        let mut not_object = json!("job");
        assert!(!normalize_status(&mut not_object));
    }

    #[test]
    fn test_list_heals_stored_statuses() {
        let (store, repo) = test_repo();
        store
            .set(
                JOBS_KEY,
                r#"[
                    {"id": 1, "title": "A", "company": "Acme"},
                    {"id": 2, "title": "B", "company": "Acme", "status": "Inactive"},
                    {"id": 3, "title": "C", "company": "Acme", "status": null},
                    {"id": 4, "title": "D", "company": "Acme", "status": "paused"}
                ]"#,
            )
            .unwrap();

        let statuses: Vec<JobStatus> = repo.list().iter().map(|j| j.status).collect();
        assert_eq!(
            statuses,
            vec![JobStatus::Active, JobStatus::Inactive, JobStatus::Active, JobStatus::Active]
        );

        // The corrected collection was written back.
        let raw: Vec<Value> = codec::read(&*store, JOBS_KEY, Vec::new());
        let stored: Vec<&str> = raw.iter().map(|j| j["status"].as_str().unwrap()).collect();
        assert_eq!(stored, vec!["active", "inactive", "active", "active"]);
    }

    #[test]
    fn test_insert_and_toggle() {
        let (_, repo) = test_repo();
        let job = repo.insert(sample_job("Rust Engineer", "Acme")).unwrap();
        assert!(job.id > 0);

        let toggled = repo.toggle_status(job.id).unwrap().unwrap();
        assert_eq!(toggled.status, JobStatus::Inactive);
        assert!(repo.active().is_empty());

        repo.set_status(job.id, JobStatus::Active).unwrap();
        assert_eq!(repo.active().len(), 1);
        assert!(repo.toggle_status(999).unwrap().is_none());
    }

    #[test]
    fn test_by_company_and_delete() {
        let (_, repo) = test_repo();
        let a = repo.insert(sample_job("Dev", "Acme")).unwrap();
        repo.insert(sample_job("QA", "Globex")).unwrap();

        let acme = Company {
            name: "ACME".into(),
            email: "hr@acme.com".into(),
            contact: String::new(),
            password: String::new(),
            location: None,
            website: None,
            description: None,
        };
        let owned = repo.by_company(&acme);
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, a.id);

        assert!(repo.delete(a.id).unwrap().is_some());
        assert!(repo.by_company(&acme).is_empty());
        assert_eq!(repo.list().len(), 1);
    }
}

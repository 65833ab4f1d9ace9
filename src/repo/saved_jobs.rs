use crate::error::StoreError;
use crate::models::SavedJob;
use crate::store::SharedStore;

use super::{Collection, Record};

pub const SAVED_JOBS_KEY: &str = "savedJobs";

impl Record for SavedJob {
    type Id = (i64, i64);

    fn id(&self) -> (i64, i64) {
        (self.user_id, self.job_id)
    }
}

#[derive(Clone)]
pub struct SavedJobRepo {
    saved: Collection<SavedJob>,
}

impl SavedJobRepo {
    pub fn new(store: SharedStore) -> Self {
        Self {
            saved: Collection::new(store, SAVED_JOBS_KEY),
        }
    }

    pub fn list(&self) -> Vec<SavedJob> {
        self.saved.list()
    }

    /// Saving an already saved job keeps the original snapshot. Returns true
    /// when the job was newly saved.
    pub fn save_job(&self, snapshot: SavedJob) -> Result<bool, StoreError> {
        self.saved.modify(move |index| {
            if index.contains(&snapshot.id()) {
                false
            } else {
                index.upsert(snapshot)
            }
        })
    }

    pub fn unsave(&self, user_id: i64, job_id: i64) -> Result<bool, StoreError> {
        Ok(self.saved.delete(&(user_id, job_id))?.is_some())
    }

    pub fn is_saved(&self, user_id: i64, job_id: i64) -> bool {
        self.saved.get(&(user_id, job_id)).is_some()
    }

    pub fn by_user(&self, user_id: i64) -> Vec<SavedJob> {
        self.saved.filter(|s| s.user_id == user_id)
    }

    pub fn save(&self, saved: &[SavedJob]) -> Result<(), StoreError> {
        self.saved.save(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::rc::Rc;

    fn snapshot(user_id: i64, job_id: i64, title: &str) -> SavedJob {
        SavedJob {
            user_id,
            job_id,
            title: title.to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            salary: "₹20L".to_string(),
            experience_range: "5+".to_string(),
            saved_date: "2026-10-19".to_string(),
        }
    }

    #[test]
    fn test_save_is_idempotent_and_keeps_snapshot() {
        let repo = SavedJobRepo::new(Rc::new(MemoryStore::new()));
        assert!(repo.save_job(snapshot(1, 10, "Old title")).unwrap());
        assert!(!repo.save_job(snapshot(1, 10, "New title")).unwrap());

        let saved = repo.by_user(1);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].title, "Old title");
        assert!(repo.is_saved(1, 10));
        assert!(!repo.is_saved(2, 10));
    }

    #[test]
    fn test_unsave() {
        let repo = SavedJobRepo::new(Rc::new(MemoryStore::new()));
        repo.save_job(snapshot(1, 10, "A")).unwrap();
        repo.save_job(snapshot(2, 10, "A")).unwrap();

        assert!(repo.unsave(1, 10).unwrap());
        assert!(!repo.unsave(1, 10).unwrap());
        assert_eq!(repo.list().len(), 1);
    }
}

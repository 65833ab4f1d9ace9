use crate::error::StoreError;
use crate::models::{User, UserType};
use crate::store::SharedStore;

use super::{next_timestamp_id, Collection, Record};

pub const USERS_KEY: &str = "users";

impl Record for User {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Clone)]
pub struct UserRepo {
    users: Collection<User>,
}

impl UserRepo {
    pub fn new(store: SharedStore) -> Self {
        Self {
            users: Collection::new(store, USERS_KEY),
        }
    }

    pub fn list(&self) -> Vec<User> {
        self.users.list()
    }

    pub fn get(&self, id: i64) -> Option<User> {
        self.users.get(&id)
    }

    /// Exact match, the way logins compare emails.
    pub fn find_by_email(&self, email: &str) -> Option<User> {
        self.users.find(|u| u.email == email)
    }

    pub fn find_by_email_ignore_case(&self, email: &str) -> Option<User> {
        let email = email.trim();
        self.users.find(|u| u.email.trim().eq_ignore_ascii_case(email))
    }

    pub fn by_type(&self, user_type: UserType) -> Vec<User> {
        self.users.filter(|u| u.user_type == user_type)
    }

    /// Stores a new user under a fresh id and returns it.
    pub fn insert(&self, mut user: User) -> Result<User, StoreError> {
        self.users.modify(move |index| {
            user.id = next_timestamp_id(index.iter().map(|u| u.id));
            index.upsert(user.clone());
            user
        })
    }

    pub fn upsert(&self, user: User) -> Result<(), StoreError> {
        self.users.upsert(user).map(|_| ())
    }

    /// Applies `f` to the stored user, if present, and returns the result.
    pub fn update(&self, id: i64, f: impl FnOnce(&mut User)) -> Result<Option<User>, StoreError> {
        self.users.modify(|index| {
            index.get_mut(&id).map(|user| {
                f(user);
                user.clone()
            })
        })
    }

    pub fn delete(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.users.delete(&id)
    }

    pub fn save(&self, users: &[User]) -> Result<(), StoreError> {
        self.users.save(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::rc::Rc;

    fn test_repo() -> UserRepo {
        UserRepo::new(Rc::new(MemoryStore::new()))
    }

    fn sample_user(email: &str, user_type: UserType) -> User {
        User {
            id: 0,
            name: "Test User".to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            user_type,
            contact: None,
            degree: None,
            experience: None,
            location: None,
            resume: None,
            photo: None,
        }
    }

    #[test]
    fn test_insert_assigns_distinct_ids() {
        let repo = test_repo();
        let a = repo.insert(sample_user("a@x.com", UserType::Applicant)).unwrap();
        let b = repo.insert(sample_user("b@x.com", UserType::Recruiter)).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(repo.list().len(), 2);
        assert_eq!(repo.get(b.id).unwrap().email, "b@x.com");
    }

    #[test]
    fn test_find_by_email_case() {
        let repo = test_repo();
        repo.insert(sample_user("Asha@X.com", UserType::Applicant)).unwrap();

        assert!(repo.find_by_email("asha@x.com").is_none());
        assert!(repo.find_by_email("Asha@X.com").is_some());
        assert!(repo.find_by_email_ignore_case(" asha@x.com").is_some());
    }

    #[test]
    fn test_update_and_delete() {
        let repo = test_repo();
        let user = repo.insert(sample_user("a@x.com", UserType::Applicant)).unwrap();

        let updated = repo
            .update(user.id, |u| u.location = Some("Pune".into()))
            .unwrap()
            .unwrap();
        assert_eq!(updated.location.as_deref(), Some("Pune"));
        assert!(repo.update(42, |_| {}).unwrap().is_none());

        assert!(repo.delete(user.id).unwrap().is_some());
        assert!(repo.list().is_empty());
    }

    #[test]
    fn test_by_type() {
        let repo = test_repo();
        repo.insert(sample_user("a@x.com", UserType::Applicant)).unwrap();
        repo.insert(sample_user("r@x.com", UserType::Recruiter)).unwrap();
        repo.insert(sample_user("b@x.com", UserType::Applicant)).unwrap();
        assert_eq!(repo.by_type(UserType::Applicant).len(), 2);
        assert_eq!(repo.by_type(UserType::Admin).len(), 0);
    }
}

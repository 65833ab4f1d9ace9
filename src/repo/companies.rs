use tracing::{info, warn};

use crate::codec;
use crate::error::StoreError;
use crate::models::Company;
use crate::store::SharedStore;

use super::{Collection, Record};

pub const COMPANIES_KEY: &str = "registeredCompanies";
/// Older single-company form. Only ever a mirror of the list's first entry.
pub const LEGACY_COMPANY_KEY: &str = "registeredCompany";

impl Record for Company {
    type Id = String;

    fn id(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

#[derive(Clone)]
pub struct CompanyRepo {
    companies: Collection<Company>,
}

impl CompanyRepo {
    pub fn new(store: SharedStore) -> Self {
        Self {
            companies: Collection::new(store, COMPANIES_KEY),
        }
    }

    pub fn list(&self) -> Vec<Company> {
        self.migrate_legacy();
        self.companies.list()
    }

    /// The company shown by single-company views: the first in the list.
    pub fn current(&self) -> Option<Company> {
        self.list().into_iter().next()
    }

    pub fn find_by_email(&self, email: &str) -> Option<Company> {
        self.migrate_legacy();
        self.companies.get(&email.trim().to_lowercase())
    }

    /// Compares digits only, so "98765 43210" matches "9876543210".
    pub fn find_by_contact(&self, contact: &str) -> Option<Company> {
        let wanted = digits(contact);
        if wanted.is_empty() {
            return None;
        }
        self.migrate_legacy();
        self.companies.find(|c| digits(&c.contact) == wanted)
    }

    pub fn upsert(&self, company: Company) -> Result<(), StoreError> {
        self.migrate_legacy();
        self.companies.upsert(company)?;
        self.mirror_legacy()
    }

    /// Write path for callers that still think in terms of one company: it
    /// becomes the first entry of the list.
    pub fn save_legacy(&self, company: Company) -> Result<(), StoreError> {
        self.migrate_legacy();
        self.companies.modify(move |index| index.insert_first(company))?;
        self.mirror_legacy()
    }

    pub fn delete(&self, email: &str) -> Result<Option<Company>, StoreError> {
        self.migrate_legacy();
        let removed = self.companies.delete(&email.trim().to_lowercase())?;
        self.mirror_legacy()?;
        Ok(removed)
    }

    pub fn save(&self, companies: &[Company]) -> Result<(), StoreError> {
        self.companies.save(companies)?;
        self.mirror_legacy()
    }

    /// Stores written before the list existed only carry the single record.
    fn migrate_legacy(&self) {
        if !self.companies.is_absent() {
            return;
        }
        let store = self.companies.store();
        let Some(legacy) = codec::read_optional::<Company>(&**store, LEGACY_COMPANY_KEY)
        else {
            return;
        };
        info!(email = %legacy.email, "migrating legacy company record into list");
        if let Err(e) = self.companies.save(std::slice::from_ref(&legacy)) {
            warn!(error = %e, "failed to migrate legacy company record");
        }
    }

    fn mirror_legacy(&self) -> Result<(), StoreError> {
        let store = self.companies.store();
        match self.companies.list().into_iter().next() {
            Some(first) => codec::write(&**store, LEGACY_COMPANY_KEY, &first),
            None => codec::remove(&**store, LEGACY_COMPANY_KEY),
        }
    }
}

fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::rc::Rc;

    fn company(name: &str, email: &str, contact: &str) -> Company {
        Company {
            name: name.to_string(),
            email: email.to_string(),
            contact: contact.to_string(),
            password: "secret1".to_string(),
            location: None,
            website: None,
            description: None,
        }
    }

    fn test_repo() -> (Rc<MemoryStore>, CompanyRepo) {
        let store = Rc::new(MemoryStore::new());
        let repo = CompanyRepo::new(store.clone());
        (store, repo)
    }

    #[test]
    fn test_legacy_write_shows_up_in_list() {
        let (_, repo) = test_repo();
        let acme = company("Acme", "hr@acme.com", "9000000000");
        repo.save_legacy(acme.clone()).unwrap();
        assert_eq!(repo.list(), vec![acme.clone()]);
        assert_eq!(repo.current(), Some(acme));
    }

    #[test]
    fn test_list_writes_mirror_first_entry() {
        let (store, repo) = test_repo();
        let acme = company("Acme", "hr@acme.com", "9000000000");
        let globex = company("Globex", "jobs@globex.com", "9111111111");
        repo.upsert(acme.clone()).unwrap();
        repo.upsert(globex.clone()).unwrap();

        let legacy: Option<Company> = codec::read_optional(&*store, LEGACY_COMPANY_KEY);
        assert_eq!(legacy, Some(acme.clone()));

        repo.save_legacy(globex.clone()).unwrap();
        let legacy: Option<Company> = codec::read_optional(&*store, LEGACY_COMPANY_KEY);
        assert_eq!(legacy, Some(globex.clone()));
        assert_eq!(repo.list(), vec![globex.clone(), acme.clone()]);

        repo.delete("JOBS@globex.com").unwrap();
        repo.delete("hr@acme.com").unwrap();
        assert!(repo.list().is_empty());
        assert_eq!(store.get(LEGACY_COMPANY_KEY).unwrap(), None);
    }

    #[test]
    fn test_legacy_only_store_is_migrated() {
        let (store, repo) = test_repo();
        store
            .set(
                LEGACY_COMPANY_KEY,
                r#"{"companyName": "Initech", "email": "hr@initech.com", "contact": "9222222222"}"#,
            )
            .unwrap();

        let companies = repo.list();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].name, "Initech");
        assert!(store.get(COMPANIES_KEY).unwrap().is_some());
    }

    #[test]
    fn test_find_by_email_and_contact() {
        let (_, repo) = test_repo();
        repo.upsert(company("Acme", "HR@Acme.com", "98765 43210")).unwrap();

        assert!(repo.find_by_email("hr@acme.com").is_some());
        assert!(repo.find_by_contact("9876543210").is_some());
        assert!(repo.find_by_contact("").is_none());
        assert!(repo.find_by_contact("9000000000").is_none());
    }
}

use std::cell::RefCell;
use tracing::{info, warn};

use crate::codec;
use crate::config::RoleTable;
use crate::error::{BoardError, BoardResult, StoreError};
use crate::events::{SessionBus, SessionChanged, Subscription};
use crate::models::{User, UserType};
use crate::repo::UserRepo;
use crate::store::SharedStore;

pub const CURRENT_USER_KEY: &str = "currentUser";
pub const PENDING_SIGNUP_KEY: &str = "pendingSignupType";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    user: Option<User>,
}

impl SessionContext {
    pub fn new(user: Option<User>) -> Self {
        Self { user }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_type(&self) -> Option<UserType> {
        self.user.as_ref().map(|u| u.user_type)
    }

    pub fn is(&self, user_type: UserType) -> bool {
        self.user_type() == Some(user_type)
    }

    pub fn require_login(&self) -> BoardResult<&User> {
        self.user.as_ref().ok_or(BoardError::NotLoggedIn)
    }

    pub fn require(&self, roles: &[UserType]) -> BoardResult<&User> {
        let user = self.require_login()?;
        if roles.contains(&user.user_type) {
            Ok(user)
        } else {
            Err(BoardError::Unauthorized {
                required: roles.to_vec(),
            })
        }
    }
}

pub struct SessionService {
    store: SharedStore,
    users: UserRepo,
    roles: RoleTable,
    bus: SessionBus,
    last_seen: RefCell<Option<User>>,
}

impl SessionService {
    pub fn new(store: SharedStore, users: UserRepo, roles: RoleTable) -> Self {
        let last_seen = codec::read_optional::<User>(&*store, CURRENT_USER_KEY);
        Self {
            store,
            users,
            roles,
            bus: SessionBus::new(),
            last_seen: RefCell::new(last_seen),
        }
    }

    fn stored(&self) -> Option<User> {
        codec::read_optional(&*self.store, CURRENT_USER_KEY)
    }

    /// The logged-in user. A pointer to a user that has since been deleted
    /// is cleared and reads as logged out. Accounts from the role table
    /// never live in the users collection and are exempt.
    pub fn current(&self) -> Option<User> {
        let user = self.stored()?;
        if is_role_account(&user) || self.users.get(user.id).is_some() {
            return Some(user);
        }
        warn!(user_id = user.id, email = %user.email, "session points at a missing user, clearing it");
        if let Err(e) = self.set_current(None) {
            warn!(error = %e, "failed to clear dangling session");
        }
        None
    }

    pub fn context(&self) -> SessionContext {
        SessionContext::new(self.current())
    }

    pub fn login(&self, email: &str, password: &str) -> BoardResult<User> {
        let user = match self.roles.authenticate(email, password) {
            Some((position, account)) => User {
                id: -(position as i64) - 1,
                name: account.name.clone().unwrap_or_default(),
                email: account.email.clone(),
                password: String::new(),
                user_type: account.user_type,
                contact: None,
                degree: None,
                experience: None,
                location: None,
                resume: None,
                photo: None,
            },
            None => match self.users.find_by_email(email) {
                Some(user) if user.password == password => user,
                _ => return Err(BoardError::InvalidCredentials),
            },
        };
        self.set_current(Some(user.clone()))?;
        info!(user_id = user.id, user_type = %user.user_type, "logged in");
        Ok(user)
    }

    pub fn start(&self, user: User) -> Result<(), StoreError> {
        info!(user_id = user.id, user_type = %user.user_type, "session started");
        self.set_current(Some(user))
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        if self.stored().is_none() {
            return Ok(());
        }
        info!("logged out");
        self.set_current(None)
    }

    pub fn refresh(&self, user: User) -> Result<(), StoreError> {
        self.set_current(Some(user))
    }

    // Write first, then notify, so listeners read the new value.
    fn set_current(&self, next: Option<User>) -> Result<(), StoreError> {
        let previous = self.stored().map(|u| u.id);
        match &next {
            Some(user) => codec::write(&*self.store, CURRENT_USER_KEY, user)?,
            None => codec::remove(&*self.store, CURRENT_USER_KEY)?,
        }
        let event = SessionChanged {
            previous,
            next: next.as_ref().map(|u| u.id),
        };
        *self.last_seen.borrow_mut() = next;
        self.bus.emit(&event);
        Ok(())
    }

    /// Called after the store reported a commit from another process. Emits
    /// a change if the persisted session differs from what this process last
    /// saw.
    pub fn sync_external(&self) -> bool {
        let now = self.stored();
        let previous = {
            let last = self.last_seen.borrow();
            if *last == now {
                return false;
            }
            last.as_ref().map(|u| u.id)
        };
        let event = SessionChanged {
            previous,
            next: now.as_ref().map(|u| u.id),
        };
        *self.last_seen.borrow_mut() = now;
        self.bus.emit(&event);
        true
    }

    pub fn begin_signup(&self, user_type: UserType) -> Result<(), StoreError> {
        codec::write(&*self.store, PENDING_SIGNUP_KEY, &user_type)
    }

    pub fn pending_signup(&self) -> Option<UserType> {
        codec::read_optional(&*self.store, PENDING_SIGNUP_KEY)
    }

    pub fn clear_pending_signup(&self) -> Result<(), StoreError> {
        codec::remove(&*self.store, PENDING_SIGNUP_KEY)
    }

    pub fn subscribe(&self, f: impl Fn(&SessionChanged) + 'static) -> Subscription {
        self.bus.subscribe(f)
    }
}

fn is_role_account(user: &User) -> bool {
    user.id < 0 && user.user_type.is_privileged()
}

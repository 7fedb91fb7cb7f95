/*
`Store` methods for the `users` collection.

Only profile data lives here; password hashes and session keys are the
`auth` module's business.
*/
use mongodb::bson::{DateTime, doc};

use super::{DbError, Store};
use crate::user::{Role, User};

impl Store {
    /**
    Insert a new user profile.

    The uname is checked for prior use first, mainly to ensure good
    error messaging; the unique index on `users.uname` is the backstop.
    */
    pub async fn insert_user(
        &self,
        uname: &str,
        role: Role,
    ) -> Result<User, DbError> {
        log::trace!("Store::insert_user( {:?}, {} ) called.", uname, role);

        if let Some(u) = self.get_user_by_uname(uname).await? {
            return Err(DbError::from(format!(
                "Username {:?} already exists with role {}.",
                uname, u.role
            )));
        }

        let mut user = User {
            id: None,
            uname: uname.to_owned(),
            role,
            created: DateTime::now(),
        };

        let res = self.users().insert_one(&user, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Error inserting user record"))?;
        user.id = res.inserted_id.as_object_id();

        Ok(user)
    }

    pub async fn get_user_by_uname(
        &self,
        uname: &str,
    ) -> Result<Option<User>, DbError> {
        log::trace!("Store::get_user_by_uname( {:?} ) called.", uname);

        self.users().find_one(doc! { "uname": uname }, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Error querying user record"))
    }
}

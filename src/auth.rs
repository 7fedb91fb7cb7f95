/*!
Password and session-key handling.

Accounts live in the record store's `users` collection; this module owns
the secrets side: argon2-encoded salted password hashes in `passwords`
and the single live session key per account in `sessions`. Password
verification is the argon2 crate's constant-time check.
*/
use mongodb::bson::{doc, DateTime};
use mongodb::{Collection, Database, IndexModel, options::{FindOneAndReplaceOptions, IndexOptions}};
use rand::{Rng, distributions};
use serde::{Deserialize, Serialize};

use crate::store::DbError;

/// Registration refuses passwords shorter than this many characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

const DEFAULT_SALT_LENGTH: usize = 16;
const DEFAULT_KEY_LENGTH: usize = 32;
const TOKEN_CHARS: &str =
"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Deserialize, Serialize)]
struct PasswordRecord {
    uname: String,
    /// argon2 encoded form; the salt travels inside it.
    hash: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct SessionRecord {
    uname: String,
    key: String,
    issued: DateTime,
}

#[derive(Debug, PartialEq)]
pub enum AuthResult {
    Ok,
    Key(String),
    BadPassword,
    NoSuchUser,
    InvalidKey,
}

pub struct Db {
    db: Database,
    token_chars: Vec<char>,
    salt_length: usize,
    key_length: usize,
}

impl Db {
    pub fn new(db: Database) -> Self {
        log::trace!("auth::Db::new( [ {:?} ] ) called.", db.name());

        let token_chars: Vec<char> = TOKEN_CHARS.chars().collect();

        Self {
            db,
            token_chars,
            salt_length: DEFAULT_SALT_LENGTH,
            key_length: DEFAULT_KEY_LENGTH,
        }
    }

    fn passwords(&self) -> Collection<PasswordRecord> {
        self.db.collection("passwords")
    }

    fn sessions(&self) -> Collection<SessionRecord> {
        self.db.collection("sessions")
    }

    /// Random string drawn from `token_chars`; used for both salts and
    /// session keys, which differ only in length.
    fn generate_token(&self, length: usize) -> String {
        // self.token_chars never has zero length.
        let dist = distributions::Slice::new(&self.token_chars).unwrap();
        let rng = rand::thread_rng();
        rng.sample_iter(&dist).take(length).collect()
    }

    fn generate_salt(&self) -> String {
        self.generate_token(self.salt_length)
    }

    fn generate_key(&self) -> String {
        self.generate_token(self.key_length)
    }

    /// Ensure the unique-per-uname indexes on both auth collections.
    pub async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("auth::Db::ensure_db_schema() called.");

        for coll in ["passwords", "sessions"] {
            let mut keys = mongodb::bson::Document::new();
            keys.insert("uname", 1);
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.db.collection::<mongodb::bson::Document>(coll)
                .create_index(index, None).await
                .map_err(|e| DbError::from(e)
                    .annotate("Unable to ensure auth indexes"))?;
        }

        Ok(())
    }

    /// Drop the auth collections to fully reset state after testing.
    #[cfg(test)]
    pub async fn nuke_auth_records(&self) -> Result<(), DbError> {
        log::trace!("auth::Db::nuke_auth_records() called.");

        for coll in ["passwords", "sessions"] {
            self.db.collection::<mongodb::bson::Document>(coll)
                .drop(None).await
                .map_err(|e| DbError::from(e).annotate("Error dropping"))?;
        }

        Ok(())
    }

    /// Hash and store the password for a new account. The account's
    /// profile record is the store's business; this only writes the
    /// secret side.
    pub async fn add_user(
        &self,
        uname: &str,
        password: &str,
    ) -> Result<(), DbError> {
        log::trace!("auth::Db::add_user( {:?}, [ password ] ) called.", uname);

        let salt = self.generate_salt();
        let hash = argon2::hash_encoded(
            password.as_bytes(),
            salt.as_bytes(),
            &argon2::Config::default(),
        ).map_err(|e| DbError::from(format!("Error hashing password: {}", &e)))?;

        let rec = PasswordRecord { uname: uname.to_owned(), hash };
        self.passwords().insert_one(&rec, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Error inserting password record"))?;

        Ok(())
    }

    pub async fn check_password(
        &self,
        uname: &str,
        password: &str,
    ) -> Result<AuthResult, DbError> {
        log::trace!("auth::Db::check_password( {:?}, [ password ] ) called.", uname);

        let rec = match self.passwords()
            .find_one(doc! { "uname": uname }, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Error querying password record"))?
        {
            None => { return Ok(AuthResult::NoSuchUser); },
            Some(rec) => rec,
        };

        let good = argon2::verify_encoded(&rec.hash, password.as_bytes())
            .map_err(|e| DbError::from(format!("Error verifying password: {}", &e)))?;

        if good {
            Ok(AuthResult::Ok)
        } else {
            Ok(AuthResult::BadPassword)
        }
    }

    /// Check the password and, if it verifies, issue a fresh session key.
    /// Any previously issued key for the account stops working.
    pub async fn check_password_and_issue_key(
        &self,
        uname: &str,
        password: &str,
    ) -> Result<AuthResult, DbError> {
        log::trace!(
            "auth::Db::check_password_and_issue_key( {:?}, [ password ] ) called.",
            uname
        );

        match self.check_password(uname, password).await? {
            AuthResult::Ok => {},
            x => { return Ok(x); },
        }

        let key = self.generate_key();
        let rec = SessionRecord {
            uname: uname.to_owned(),
            key: key.clone(),
            issued: DateTime::now(),
        };
        let opts = FindOneAndReplaceOptions::builder().upsert(true).build();
        self.sessions()
            .find_one_and_replace(doc! { "uname": uname }, &rec, opts).await
            .map_err(|e| DbError::from(e)
                .annotate("Error storing session key"))?;

        Ok(AuthResult::Key(key))
    }

    pub async fn check_key(
        &self,
        uname: &str,
        key: &str,
    ) -> Result<AuthResult, DbError> {
        log::trace!("auth::Db::check_key( {:?}, [ key ] ) called.", uname);

        let found = self.sessions()
            .find_one(doc! { "uname": uname, "key": key }, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Error querying session key"))?;

        match found {
            Some(_) => Ok(AuthResult::Ok),
            None => Ok(AuthResult::InvalidKey),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    use serial_test::serial;

    static TEST_DB_URI: &str = "mongodb://localhost:27017";
    static TEST_DB_NAME: &str = "rollbook_auth_test";

    async fn test_db() -> Db {
        let client = mongodb::Client::with_uri_str(TEST_DB_URI).await.unwrap();
        Db::new(client.database(TEST_DB_NAME))
    }

    #[tokio::test]
    async fn tokens_have_requested_shape() {
        ensure_logging();
        let db = test_db().await;

        let salt = db.generate_salt();
        let key = db.generate_key();
        assert_eq!(salt.chars().count(), DEFAULT_SALT_LENGTH);
        assert_eq!(key.chars().count(), DEFAULT_KEY_LENGTH);
        assert!(key.chars().all(|c| TOKEN_CHARS.contains(c)));

        // Vanishingly unlikely to collide.
        assert_ne!(db.generate_key(), db.generate_key());
    }

    #[tokio::test]
    async fn hashes_verify_and_embed_salt() {
        ensure_logging();
        let db = test_db().await;

        let salt = db.generate_salt();
        let hash = argon2::hash_encoded(
            b"correct horse", salt.as_bytes(), &argon2::Config::default()
        ).unwrap();

        assert!(argon2::verify_encoded(&hash, b"correct horse").unwrap());
        assert!(!argon2::verify_encoded(&hash, b"wrong pony").unwrap());
    }

    /**
    The remaining tests need a local `mongod` listening on the default
    port, with write access to the `rollbook_auth_test` database:

    ```bash
    cargo test auth -- --ignored
    ```
    */
    #[tokio::test]
    #[ignore]
    #[serial]
    async fn password_and_key_round_trip() {
        ensure_logging();
        let db = test_db().await;
        db.ensure_db_schema().await.unwrap();

        db.add_user("alice", "hunter2hunter2").await.unwrap();

        assert_eq!(
            db.check_password("alice", "hunter2hunter2").await.unwrap(),
            AuthResult::Ok
        );
        assert_eq!(
            db.check_password("alice", "wrong").await.unwrap(),
            AuthResult::BadPassword
        );
        assert_eq!(
            db.check_password("nobody", "hunter2hunter2").await.unwrap(),
            AuthResult::NoSuchUser
        );

        let key = match db.check_password_and_issue_key("alice", "hunter2hunter2")
            .await.unwrap()
        {
            AuthResult::Key(k) => k,
            x => panic!("expected a key, got {:?}", x),
        };
        assert_eq!(
            db.check_key("alice", &key).await.unwrap(),
            AuthResult::Ok
        );
        assert_eq!(
            db.check_key("alice", "forged").await.unwrap(),
            AuthResult::InvalidKey
        );

        // Issuing again invalidates the old key.
        let newer = match db.check_password_and_issue_key("alice", "hunter2hunter2")
            .await.unwrap()
        {
            AuthResult::Key(k) => k,
            x => panic!("expected a key, got {:?}", x),
        };
        assert_eq!(
            db.check_key("alice", &key).await.unwrap(),
            AuthResult::InvalidKey
        );
        assert_eq!(
            db.check_key("alice", &newer).await.unwrap(),
            AuthResult::Ok
        );

        db.nuke_auth_records().await.unwrap();
    }
}

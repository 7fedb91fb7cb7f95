/*!
Record-store interaction module.

The MongoDB database behind this holds the collections listed in
`INDEXED_FIELDS` (plus the auth-side collections owned by the `auth`
module). Field presence and shape are the business of the boundary
types in `student` and `user`; what the store itself enforces is
uniqueness, through the indexes ensured at startup:

```text
students.studentId   unique
users.uname          unique
```
*/
use mongodb::{Client, Collection, Database, IndexModel, options::IndexOptions};
use mongodb::bson::{doc, Document};

use crate::student::Student;
use crate::user::User;

pub mod students;
pub mod users;

/// Collections and the field each must keep unique.
static INDEXED_FIELDS: &[(&str, &str)] = &[
    ("students", "studentId"),
    ("users", "uname"),
];

#[derive(Debug, PartialEq)]
pub struct DbError(String);

impl DbError {
    /// Prepend some contextual `annotation` for the error.
    pub(crate) fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }

    pub fn display(&self) -> &str { &self.0 }
}

impl From<mongodb::error::Error> for DbError {
    fn from(e: mongodb::error::Error) -> DbError {
        DbError(format!("Record store: {}", &e))
    }
}

impl From<String> for DbError {
    fn from(s: String) -> DbError { DbError(s) }
}

pub struct Store {
    db: Database,
}

impl Store {
    pub fn new(db: Database) -> Self {
        log::trace!("Store::new( [ {:?} ] ) called.", db.name());

        Self { db }
    }

    /// Connect a driver client and hand back the named database.
    ///
    /// The driver connects lazily, so this succeeding says nothing about
    /// the server being reachable; see `ping()`.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Database, DbError> {
        log::trace!("Store::connect( {:?}, {:?} ) called.", uri, db_name);

        let client = Client::with_uri_str(uri).await
            .map_err(|e| DbError::from(e)
                .annotate("Unable to parse record-store URI"))?;
        Ok(client.database(db_name))
    }

    pub(crate) fn students(&self) -> Collection<Student> {
        self.db.collection("students")
    }

    pub(crate) fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    /// Round-trip to the server. Startup aborts if this fails.
    pub async fn ping(&self) -> Result<(), DbError> {
        log::trace!("Store::ping() called.");

        self.db.run_command(doc! { "ping": 1 }, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Record store unreachable"))?;
        Ok(())
    }

    /// Ensure the unique indexes that back the store's invariants.
    pub async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("Store::ensure_db_schema() called.");

        for (coll, field) in INDEXED_FIELDS.iter() {
            let mut keys = Document::new();
            keys.insert(*field, 1);
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.db.collection::<Document>(coll)
                .create_index(index, None).await
                .map_err(|e| DbError::from(e).annotate(
                    "Unable to ensure record-store indexes"
                ))?;
        }

        Ok(())
    }

    /**
    Drop the store's collections to fully reset database state.

    This is only meant for cleanup after testing. It is advisable to look
    at the ERROR level log output when testing to ensure this method did
    its job.
    */
    #[cfg(test)]
    pub async fn nuke_database(&self) -> Result<(), DbError> {
        log::trace!("Store::nuke_database() called.");

        for (coll, _) in INDEXED_FIELDS.iter() {
            if let Err(e) = self.db.collection::<Document>(coll).drop(None).await {
                let err = DbError::from(e);
                log::error!("Error dropping {:?}: {}", coll, err.display());
            }
        }

        log::trace!("    ...nuking complete.");
        Ok(())
    }
}

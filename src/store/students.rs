/*
`Store` methods for the `students` collection: CRUD, the filtered
search, and the registration-gate probe.

Uniqueness of `studentId` is pre-checked by the handlers for friendly
error messages; the unique index is the backstop, so a race between the
pre-check and the write surfaces as a store fault rather than a
duplicate record.
*/
use futures::stream::TryStreamExt;
use mongodb::bson::{DateTime, doc, Document, oid::ObjectId};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};

use super::{DbError, Store};
use crate::student::{NewStudent, Student, StudentPatch};

impl Store {
    pub async fn insert_student(
        &self,
        new: &NewStudent,
    ) -> Result<Student, DbError> {
        log::trace!(
            "Store::insert_student( {:?} [ {:?} ] ) called.",
            &new.student_id, &new.name
        );

        let mut student = Student {
            id: None,
            name: new.name.clone(),
            student_id: new.student_id.clone(),
            class: new.class.clone(),
            score: new.score,
            created: DateTime::now(),
        };

        let res = self.students().insert_one(&student, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Error inserting student record"))?;
        student.id = res.inserted_id.as_object_id();

        Ok(student)
    }

    /// All student records, newest-created first.
    pub async fn get_students(&self) -> Result<Vec<Student>, DbError> {
        log::trace!("Store::get_students() called.");

        let opts = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .build();
        let mut cursor = self.students().find(None, opts).await
            .map_err(|e| DbError::from(e)
                .annotate("Error querying student records"))?;

        let mut students: Vec<Student> = Vec::new();
        while let Some(s) = cursor.try_next().await
            .map_err(|e| DbError::from(e)
                .annotate("Error reading student records"))?
        {
            students.push(s);
        }

        Ok(students)
    }

    pub async fn get_student(
        &self,
        id: ObjectId,
    ) -> Result<Option<Student>, DbError> {
        log::trace!("Store::get_student( {} ) called.", &id);

        self.students().find_one(doc! { "_id": id }, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Error querying student record"))
    }

    pub async fn get_student_by_student_id(
        &self,
        student_id: &str,
    ) -> Result<Option<Student>, DbError> {
        log::trace!(
            "Store::get_student_by_student_id( {:?} ) called.",
            student_id
        );

        self.students().find_one(doc! { "studentId": student_id }, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Error querying student record by studentId"))
    }

    /// Is `student_id` already carried by a record other than
    /// `excluding`? Used by the update pre-check.
    pub async fn student_id_taken_by_other(
        &self,
        student_id: &str,
        excluding: ObjectId,
    ) -> Result<bool, DbError> {
        log::trace!(
            "Store::student_id_taken_by_other( {:?}, {} ) called.",
            student_id, &excluding
        );

        let found = self.students().find_one(
            doc! { "studentId": student_id, "_id": { "$ne": excluding } },
            None,
        ).await
            .map_err(|e| DbError::from(e)
                .annotate("Error probing for studentId collision"))?;

        Ok(found.is_some())
    }

    /// Overwrite the fields present in `patch`; absent fields are left
    /// alone. Returns the updated record, or `None` for an unknown id.
    pub async fn update_student(
        &self,
        id: ObjectId,
        patch: &StudentPatch,
    ) -> Result<Option<Student>, DbError> {
        log::trace!("Store::update_student( {}, {:?} ) called.", &id, patch);

        let mut set = Document::new();
        if let Some(name) = &patch.name {
            set.insert("name", name);
        }
        if let Some(student_id) = &patch.student_id {
            set.insert("studentId", student_id);
        }
        if let Some(class) = &patch.class {
            set.insert("class", class);
        }
        if let Some(score) = patch.score {
            set.insert("score", score);
        }

        // An empty $set is a driver error; an empty patch is just a read.
        if set.is_empty() {
            return self.get_student(id).await;
        }

        let opts = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.students().find_one_and_update(
            doc! { "_id": id },
            doc! { "$set": set },
            opts,
        ).await
            .map_err(|e| DbError::from(e)
                .annotate("Error updating student record"))
    }

    /// Returns the deleted record, or `None` for an unknown id.
    pub async fn delete_student(
        &self,
        id: ObjectId,
    ) -> Result<Option<Student>, DbError> {
        log::trace!("Store::delete_student( {} ) called.", &id);

        self.students().find_one_and_delete(doc! { "_id": id }, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Error deleting student record"))
    }

    /// Records matching all supplied constraints (class exact, score
    /// range inclusive), sorted score-descending. Omitted constraints
    /// don't filter.
    pub async fn filter_students(
        &self,
        class: Option<&str>,
        min_score: Option<f64>,
        max_score: Option<f64>,
    ) -> Result<Vec<Student>, DbError> {
        log::trace!(
            "Store::filter_students( {:?}, {:?}, {:?} ) called.",
            class, min_score, max_score
        );

        let mut filter = Document::new();
        if let Some(class) = class {
            filter.insert("class", class);
        }
        let mut range = Document::new();
        if let Some(min) = min_score {
            range.insert("$gte", min);
        }
        if let Some(max) = max_score {
            range.insert("$lte", max);
        }
        if !range.is_empty() {
            filter.insert("score", range);
        }

        let opts = FindOptions::builder()
            .sort(doc! { "score": -1 })
            .build();
        let mut cursor = self.students().find(filter, opts).await
            .map_err(|e| DbError::from(e)
                .annotate("Error filtering student records"))?;

        let mut students: Vec<Student> = Vec::new();
        while let Some(s) = cursor.try_next().await
            .map_err(|e| DbError::from(e)
                .annotate("Error reading filtered student records"))?
        {
            students.push(s);
        }

        Ok(students)
    }

    /// Registration gate: is there an enrolled student with this exact
    /// name?
    pub async fn student_name_exists(
        &self,
        name: &str,
    ) -> Result<bool, DbError> {
        log::trace!("Store::student_name_exists( {:?} ) called.", name);

        let found = self.students().find_one(doc! { "name": name }, None).await
            .map_err(|e| DbError::from(e)
                .annotate("Error probing for enrolled student name"))?;

        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student::StudentForm;
    use crate::store::tests::test_store;
    use crate::tests::ensure_logging;

    use serial_test::serial;

    static ROSTER: &[(&str, &str, &str, f64)] = &[
        ("Alice Munro", "20250001", "3A", 95.0),
        ("Ben Okri",    "20250002", "3A", 85.0),
        ("Chinua Achebe", "20250003", "3B", 70.0),
        ("Doris Lessing", "20250004", "3B", 55.0),
    ];

    fn new_student(
        (name, student_id, class, score): (&str, &str, &str, f64)
    ) -> NewStudent {
        StudentForm {
            name: Some(name.to_owned()),
            student_id: Some(student_id.to_owned()),
            class: Some(class.to_owned()),
            score: Some(score),
        }.validate().unwrap()
    }

    /// Needs a local `mongod`; see the module tests doc in `store`.
    #[tokio::test]
    #[ignore]
    #[serial]
    async fn student_crud_round_trip() {
        ensure_logging();
        let db = test_store().await;
        db.ensure_db_schema().await.unwrap();

        for row in ROSTER.iter() {
            db.insert_student(&new_student(*row)).await.unwrap();
        }

        // Newest-created first.
        let all = db.get_students().await.unwrap();
        assert_eq!(all.len(), ROSTER.len());
        assert_eq!(all[0].student_id, "20250004");

        // Get by id round-trips.
        let alice = db.get_student_by_student_id("20250001")
            .await.unwrap().unwrap();
        let again = db.get_student(alice.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(again.name, "Alice Munro");

        // Duplicate studentId is refused by the unique index even if a
        // caller skips the pre-check.
        assert!(db.insert_student(&new_student(ROSTER[0])).await.is_err());

        // Update everything and read it back.
        let patch = StudentPatch {
            name: Some("Alice M.".to_owned()),
            student_id: Some("20259999".to_owned()),
            class: Some("4A".to_owned()),
            score: Some(88.0),
        };
        let updated = db.update_student(alice.id.unwrap(), &patch)
            .await.unwrap().unwrap();
        assert_eq!(
            (updated.name.as_str(), updated.student_id.as_str(),
             updated.class.as_str(), updated.score),
            ("Alice M.", "20259999", "4A", 88.0)
        );

        // Collision probe sees other records but not the record itself.
        assert!(
            db.student_id_taken_by_other("20250002", updated.id.unwrap())
                .await.unwrap()
        );
        assert!(
            !db.student_id_taken_by_other("20259999", updated.id.unwrap())
                .await.unwrap()
        );

        // The registration gate matches on the stored name.
        assert!(db.student_name_exists("Ben Okri").await.unwrap());
        assert!(!db.student_name_exists("Nobody Here").await.unwrap());

        // Delete, then it's gone.
        let gone = db.delete_student(updated.id.unwrap())
            .await.unwrap().unwrap();
        assert_eq!(gone.student_id, "20259999");
        assert!(db.get_student(gone.id.unwrap()).await.unwrap().is_none());
        assert!(db.delete_student(gone.id.unwrap()).await.unwrap().is_none());

        db.nuke_database().await.unwrap();
    }

    /// Needs a local `mongod`; see the module tests doc in `store`.
    #[tokio::test]
    #[ignore]
    #[serial]
    async fn filter_constraints_combine() {
        ensure_logging();
        let db = test_store().await;
        db.ensure_db_schema().await.unwrap();

        for row in ROSTER.iter() {
            db.insert_student(&new_student(*row)).await.unwrap();
        }

        // Class alone; score-descending order.
        let a = db.filter_students(Some("3A"), None, None).await.unwrap();
        assert_eq!(a.len(), 2);
        assert!(a[0].score >= a[1].score);

        // A full-range score constraint filters nothing out.
        let same = db.filter_students(Some("3A"), Some(0.0), Some(100.0))
            .await.unwrap();
        assert_eq!(
            a.iter().map(|s| s.student_id.as_str()).collect::<Vec<_>>(),
            same.iter().map(|s| s.student_id.as_str()).collect::<Vec<_>>(),
        );

        // Range bounds are inclusive.
        let mid = db.filter_students(None, Some(55.0), Some(85.0))
            .await.unwrap();
        assert_eq!(mid.len(), 3);

        // No constraints returns everything.
        let all = db.filter_students(None, None, None).await.unwrap();
        assert_eq!(all.len(), ROSTER.len());

        db.nuke_database().await.unwrap();
    }
}

/*!
Student records and their boundary types.

Every request body that touches a student goes through one of the typed
forms here (`StudentForm` for creation, `StudentPatch` for update), which
trim and bounds-check before anything reaches the store.
*/
use std::io::Read;

use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// A student record as stored in the `students` collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    /// School-assigned identifier; globally unique.
    #[serde(rename = "studentId")]
    pub student_id: String,
    /// Free-form class label.
    pub class: String,
    pub score: f64,
    #[serde(rename = "createdAt")]
    pub created: DateTime,
}

impl Student {
    /// The record as it appears in API responses: hex id, RFC 3339
    /// timestamp. BSON-specific types don't leak to the client.
    pub fn api_json(&self) -> serde_json::Value {
        json!({
            "id": self.id.map(|oid| oid.to_hex()),
            "name": self.name,
            "studentId": self.student_id,
            "class": self.class,
            "score": self.score,
            "createdAt": self.created.try_to_rfc3339_string().ok(),
        })
    }
}

fn validate_score(score: f64) -> Result<f64, String> {
    if !score.is_finite() {
        return Err("The score must be a number.".to_owned());
    }
    if score < MIN_SCORE || score > MAX_SCORE {
        return Err(format!(
            "The score must be between {} and {}.", MIN_SCORE, MAX_SCORE
        ));
    }
    Ok(score)
}

fn required_field(value: Option<&str>, what: &str) -> Result<String, String> {
    match value.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_owned()),
        _ => Err(format!("The {} field is required.", what)),
    }
}

/// A validated create request.
#[derive(Clone, Debug)]
pub struct NewStudent {
    pub name: String,
    pub student_id: String,
    pub class: String,
    pub score: f64,
}

/**
Body of a create request.

All fields are optional at the boundary so missing ones turn into
envelope-shaped validation messages instead of deserialization failures.
*/
#[derive(Debug, Deserialize)]
pub struct StudentForm {
    pub name: Option<String>,
    #[serde(rename = "studentId")]
    pub student_id: Option<String>,
    pub class: Option<String>,
    pub score: Option<f64>,
}

impl StudentForm {
    pub fn validate(self) -> Result<NewStudent, String> {
        let name = required_field(self.name.as_deref(), "name")?;
        let student_id = required_field(self.student_id.as_deref(), "student ID")?;
        let class = required_field(self.class.as_deref(), "class")?;
        let score = match self.score {
            Some(score) => validate_score(score)?,
            None => { return Err("The score field is required.".to_owned()); },
        };

        Ok(NewStudent { name, student_id, class, score })
    }
}

/// Body of an update request; absent fields are left alone.
#[derive(Debug, Deserialize)]
pub struct StudentPatch {
    pub name: Option<String>,
    #[serde(rename = "studentId")]
    pub student_id: Option<String>,
    pub class: Option<String>,
    pub score: Option<f64>,
}

impl StudentPatch {
    /// Trim and bounds-check the fields that are present.
    pub fn validate(self) -> Result<StudentPatch, String> {
        let name = self.name.as_deref()
            .map(|s| required_field(Some(s), "name"))
            .transpose()?;
        let student_id = self.student_id.as_deref()
            .map(|s| required_field(Some(s), "student ID"))
            .transpose()?;
        let class = self.class.as_deref()
            .map(|s| required_field(Some(s), "class"))
            .transpose()?;
        let score = self.score.map(validate_score).transpose()?;

        Ok(StudentPatch { name, student_id, class, score })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.student_id.is_none()
            && self.class.is_none()
            && self.score.is_none()
    }
}

impl NewStudent {
    /**
    Roster .csv rows should look like this

    ```csv
    #name,        studentId, class, score
    Alice Munro,  20250001,  3A,    92.5
    ```
    */
    pub fn from_csv_line(
        row: &csv::StringRecord
    ) -> Result<NewStudent, String> {
        log::trace!("NewStudent::from_csv_line( {:?} ) called.", row);

        let name = required_field(row.get(0), "name")?;
        let student_id = required_field(row.get(1), "student ID")?;
        let class = required_field(row.get(2), "class")?;
        let score = match row.get(3) {
            Some(s) => {
                let n: f64 = s.trim().parse()
                    .map_err(|_| format!("unreadable score {:?}", s))?;
                validate_score(n)?
            },
            None => { return Err("no score".to_owned()); },
        };

        Ok(NewStudent { name, student_id, class, score })
    }

    pub fn vec_from_csv_reader<R: Read>(r: R) -> Result<Vec<NewStudent>, String> {
        log::trace!("NewStudent::vec_from_csv_reader(...) called.");

        let mut csv_reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(false)
            .has_headers(false)
            .from_reader(r);

        let mut students: Vec<NewStudent> = Vec::new();

        for (n, res) in csv_reader.records().enumerate() {
            match res {
                Ok(record) => match NewStudent::from_csv_line(&record) {
                    Ok(stud) => { students.push(stud); },
                    Err(e) => {
                        let estr = match record.position() {
                            Some(p) => format!(
                                "Error on line {}: {}",
                                p.line(), &e
                            ),
                            None => format!(
                                "Error in CSV record {}: {}", &n, &e
                            ),
                        };
                        return Err(estr);
                    },
                },
                Err(e) => {
                    let estr = match e.position() {
                        Some(p) => format!(
                            "Error on line {}: {}", p.line(), &e
                        ),
                        None => format!(
                            "Error in CSV record {}: {}", &n, &e
                        ),
                    };
                    return Err(estr);
                }
            }
        }

        log::trace!(
            "NewStudent::vec_from_csv_reader() returns {} students.",
            students.len()
        );
        Ok(students)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    fn full_form() -> StudentForm {
        StudentForm {
            name: Some("  Alice Munro ".to_owned()),
            student_id: Some("20250001".to_owned()),
            class: Some("3A".to_owned()),
            score: Some(92.5),
        }
    }

    #[test]
    fn create_form_trims_and_accepts() {
        let new = full_form().validate().unwrap();
        assert_eq!(new.name, "Alice Munro");
        assert_eq!(new.student_id, "20250001");
        assert_eq!(new.class, "3A");
        assert_eq!(new.score, 92.5);
    }

    #[test]
    fn create_form_requires_every_field() {
        let wrecks: [fn(&mut StudentForm); 4] = [
            |f| { f.name = None; },
            |f| { f.student_id = Some("   ".to_owned()); },
            |f| { f.class = None; },
            |f| { f.score = None; },
        ];
        for wreck in wrecks {
            let mut form = full_form();
            wreck(&mut form);
            assert!(form.validate().is_err());
        }
    }

    #[test]
    fn score_bounds_enforced() {
        for bad in [-0.5, 100.01, f64::NAN, f64::INFINITY] {
            let mut form = full_form();
            form.score = Some(bad);
            assert!(form.validate().is_err());
        }
        for fine in [0.0, 100.0, 59.99] {
            let mut form = full_form();
            form.score = Some(fine);
            assert!(form.validate().is_ok());
        }
    }

    #[test]
    fn patch_checks_only_supplied_fields() {
        let patch = StudentPatch {
            name: None,
            student_id: None,
            class: Some(" 4B ".to_owned()),
            score: Some(70.0),
        };
        let patch = patch.validate().unwrap();
        assert_eq!(patch.class.as_deref(), Some("4B"));
        assert!(patch.name.is_none());
        assert!(!patch.is_empty());

        let bad = StudentPatch {
            name: Some("".to_owned()),
            student_id: None,
            class: None,
            score: None,
        };
        assert!(bad.validate().is_err());

        let noop = StudentPatch {
            name: None, student_id: None, class: None, score: None,
        };
        assert!(noop.validate().unwrap().is_empty());
    }

    #[test]
    fn students_from_csv() {
        ensure_logging();
        let f = std::fs::File::open("test/good_students.csv").unwrap();
        let studs = NewStudent::vec_from_csv_reader(f).unwrap();
        assert_eq!(studs.len(), 6);
        assert_eq!(studs[0].name, "Alice Munro");
        assert!(studs.iter().all(|s| s.score >= MIN_SCORE && s.score <= MAX_SCORE));
    }

    #[test]
    fn csv_rejects_out_of_range_scores() {
        ensure_logging();
        let data = "Bob Ames,20250099,3A,101\n";
        assert!(NewStudent::vec_from_csv_reader(data.as_bytes()).is_err());
    }
}

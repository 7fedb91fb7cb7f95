/*!
User accounts and their roles.

The password hash and session key for an account live on the auth side
(see the `auth` module); this is just the profile record kept in the
`users` collection.
*/
use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Role::Admin => "admin",
            Role::User  => "user",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user"  => Ok(Role::User),
            _ => Err(format!("{:?} is not a valid role.", s)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub uname: String,
    /// Immutable after creation; no operation changes it.
    pub role: Role,
    #[serde(rename = "createdAt")]
    pub created: DateTime,
}

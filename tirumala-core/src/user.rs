//! User record model
//!
//! A [`UserRecord`] wraps the JSON document returned by the identity service.
//! The document itself is kept verbatim so it can be persisted and handed back
//! unchanged; a typed view (base fields plus a role-tagged [`Account`]) is
//! resolved once when the record is built.

use crate::error::{ErrorContext, TirumalaError, TirumalaResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

/// Profile of a farmer account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FarmerProfile {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub village: Option<String>,
    pub location: Option<String>,
    pub state: Option<String>,
    pub crops: Option<String>,
    pub land_size: Option<f64>,
    pub preferred_language: Option<String>,
    pub avatar: Option<String>,
}

/// Profile of an expert account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpertProfile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub profile_image: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub village: Option<String>,
    pub state: Option<String>,
    pub land_size: Option<String>,
    pub preferred_language: Option<String>,
    pub crops: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default)]
    pub balance: f64,
}

/// Role-specific part of a user record
#[derive(Debug, Clone, PartialEq)]
pub enum Account {
    Farmer(Option<FarmerProfile>),
    Expert(Option<ExpertProfile>),
    /// A role this client does not know about
    Other(String),
    /// No role in the document
    Unassigned,
}

impl Account {
    pub fn role(&self) -> Option<&str> {
        match self {
            Account::Farmer(_) => Some("FARMER"),
            Account::Expert(_) => Some("EXPERT"),
            Account::Other(role) => Some(role.as_str()),
            Account::Unassigned => None,
        }
    }
}

/// Server-provided principal document
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    document: Map<String, Value>,
    id: Option<String>,
    email: Option<String>,
    wallet: Option<Wallet>,
    account: Account,
}

impl UserRecord {
    /// Build a record from a JSON value, which must be an object
    pub fn from_value(value: Value) -> TirumalaResult<Self> {
        match value {
            Value::Object(document) => Ok(Self::from_document(document)),
            other => Err(TirumalaError::MalformedResponse {
                message: format!("user record must be a JSON object, got {}", json_kind(&other)),
                source: None,
                context: ErrorContext::new("user_record").with_operation("from_value"),
            }),
        }
    }

    /// Parse a record from serialized JSON text
    pub fn from_json(text: &str) -> TirumalaResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Serialize the original document
    pub fn to_json(&self) -> TirumalaResult<String> {
        Ok(serde_json::to_string(&self.document)?)
    }

    fn from_document(document: Map<String, Value>) -> Self {
        let id = document.get("id").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        let email = document
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string);
        let wallet = document
            .get("wallet")
            .and_then(|v| lenient::<Wallet>(v, "wallet"));
        let account = resolve_account(&document);

        Self {
            document,
            id,
            email,
            wallet,
            account,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn wallet(&self) -> Option<&Wallet> {
        self.wallet.as_ref()
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn role(&self) -> Option<&str> {
        self.account.role()
    }

    /// Human-readable name taken from whichever profile is present
    pub fn display_name(&self) -> Option<&str> {
        let profile_name = match &self.account {
            Account::Farmer(Some(profile)) => profile.full_name.as_deref(),
            Account::Expert(Some(profile)) => profile.name.as_deref(),
            _ => None,
        };
        profile_name.or(self.email.as_deref())
    }

    /// The untouched server document
    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }
}

fn resolve_account(document: &Map<String, Value>) -> Account {
    let Some(role) = document.get("role").and_then(Value::as_str) else {
        return Account::Unassigned;
    };

    // Role-specific keys win over the generic `profile` field
    match role.to_ascii_uppercase().as_str() {
        "FARMER" => Account::Farmer(
            document
                .get("farmerProfile")
                .or_else(|| document.get("profile"))
                .and_then(|v| lenient::<FarmerProfile>(v, "farmerProfile")),
        ),
        "EXPERT" => Account::Expert(
            document
                .get("expertProfile")
                .or_else(|| document.get("profile"))
                .and_then(|v| lenient::<ExpertProfile>(v, "expertProfile")),
        ),
        _ => Account::Other(role.to_string()),
    }
}

fn lenient<T: for<'de> Deserialize<'de>>(value: &Value, field: &str) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(field, error = %e, "Ignoring unreadable profile section");
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Serialize for UserRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.document.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UserRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_document(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_farmer_record() {
        let user = UserRecord::from_value(json!({
            "id": "u-1",
            "email": "farmer@example.com",
            "role": "FARMER",
            "farmerProfile": {
                "fullName": "Ravi Kumar",
                "phone": "9876543210",
                "village": "Kondapur",
                "state": "Telangana",
                "crops": "Paddy, Cotton",
                "landSize": 2.5,
                "avatar": "https://example.com/a.png"
            },
            "wallet": { "balance": 150.0 }
        }))
        .unwrap();

        assert_eq!(user.id(), Some("u-1"));
        assert_eq!(user.role(), Some("FARMER"));
        assert_eq!(user.display_name(), Some("Ravi Kumar"));
        assert_eq!(user.wallet().map(|w| w.balance), Some(150.0));
        match user.account() {
            Account::Farmer(Some(profile)) => {
                assert_eq!(profile.land_size, Some(2.5));
                assert_eq!(profile.village.as_deref(), Some("Kondapur"));
            }
            other => panic!("Expected farmer account, got {other:?}"),
        }
    }

    #[test]
    fn test_expert_from_generic_profile() {
        let user = UserRecord::from_value(json!({
            "id": 7,
            "email": "expert@demo.com",
            "role": "expert",
            "profile": { "id": "p-9", "name": "Dr. Lakshmi", "title": "Soil Scientist" }
        }))
        .unwrap();

        assert_eq!(user.id(), Some("7"));
        assert_eq!(user.role(), Some("EXPERT"));
        match user.account() {
            Account::Expert(Some(profile)) => {
                assert_eq!(profile.id.as_deref(), Some("p-9"));
                assert_eq!(profile.title.as_deref(), Some("Soil Scientist"));
            }
            other => panic!("Expected expert account, got {other:?}"),
        }
    }

    #[test]
    fn test_minimal_and_unknown_roles() {
        let user = UserRecord::from_value(json!({ "id": 5 })).unwrap();
        assert_eq!(user.account(), &Account::Unassigned);
        assert_eq!(user.role(), None);
        assert_eq!(user.email(), None);

        let admin = UserRecord::from_value(json!({ "id": 1, "role": "ADMIN" })).unwrap();
        assert_eq!(admin.account(), &Account::Other("ADMIN".to_string()));
    }

    #[test]
    fn test_unreadable_profile_is_dropped_not_rejected() {
        let user = UserRecord::from_value(json!({
            "id": 2,
            "role": "FARMER",
            "farmerProfile": { "landSize": "two acres" }
        }))
        .unwrap();
        assert_eq!(user.account(), &Account::Farmer(None));
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = UserRecord::from_value(json!(["not", "a", "user"])).unwrap_err();
        assert!(err.is_recoverable());
        assert!(UserRecord::from_json("null").is_err());
        assert!(UserRecord::from_json("{not json").is_err());
    }

    #[test]
    fn test_document_passes_through_unchanged() {
        let original = json!({
            "id": 1,
            "email": "a@x.com",
            "role": "EXPERT",
            "extra": { "nested": [1, 2, 3] }
        });
        let user = UserRecord::from_value(original.clone()).unwrap();
        let reparsed: Value = serde_json::from_str(&user.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, original);

        let via_serde: UserRecord = serde_json::from_value(original).unwrap();
        assert_eq!(via_serde, user);
    }

    #[test]
    fn test_serialized_document_keeps_server_key_order() {
        let text = r#"{"role":"FARMER","id":7,"email":"b@x.com","farmerProfile":{"village":"Tuni","fullName":"Sita"}}"#;
        let user = UserRecord::from_json(text).unwrap();
        assert_eq!(user.to_json().unwrap(), text);
    }
}

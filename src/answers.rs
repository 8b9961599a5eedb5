//! Session keys and the typed shapes of structured answers.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::flow::{ItemType, Role, YES};
use crate::session::Session;

pub const ITEM_TYPE: &str = "itemType";
pub const DESCRIBE_ITEM: &str = "describeItem";
pub const IVORY_VOLUME: &str = "ivoryVolume";
pub const IVORY_AGE: &str = "ivoryAge";
pub const WHY_RMI: &str = "whyRmi";
pub const WHERE_IS_ITEM: &str = "whereIsItem";
pub const INTO_OUT_OF_GB: &str = "intoOutOfGb";
pub const OWNED_BY_APPLICANT: &str = "ownedByApplicant";
pub const INTENTION: &str = "intentionForItem";
pub const UPLOAD_PHOTOS: &str = "uploadPhotos";
pub const UPLOAD_DOCUMENTS: &str = "uploadDocuments";
pub const PAYMENT_ID: &str = "paymentId";
pub const PAYMENT_REFERENCE: &str = "paymentReference";
pub const PAYMENT_COMPLETE: &str = "paymentComplete";
pub const EMAILS_SENT: &str = "emailsSent";

// Per-role suffixes, combined with `role_key`
pub const CONTACT_DETAILS: &str = "contactDetails";
pub const ADDRESS: &str = "address";
pub const ADDRESS_SEARCH: &str = "addressSearch";
pub const ADDRESS_RESULTS: &str = "addressResults";

/// Key for an answer that exists once per role, e.g. `owner.contactDetails`
pub fn role_key(role: Role, suffix: &str) -> String {
  format!("{}.{}", role.as_str(), suffix)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDescription {
  pub what_is_item: String,
  pub where_is_ivory: String,
  pub distinguishing_features: Option<String>,
  pub where_made: Option<String>,
  pub when_made: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IvoryVolume {
  pub reason: String,
  pub other_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IvoryAge {
  pub reasons: Vec<String>,
  pub other_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
  pub name: String,
  pub business_name: Option<String>,
  pub email: Option<String>,
}

/// What the user searched for on the address-find page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSearch {
  pub postcode: String,
  pub name_or_number: Option<String>,
}

/// Item type chosen or settled so far; required by most application pages
pub async fn item_type(session: &Session) -> AppResult<ItemType> {
  session
    .get(ITEM_TYPE)
    .await?
    .as_deref()
    .and_then(ItemType::from_code)
    .ok_or(AppError::MissingAnswer(ITEM_TYPE))
}

pub async fn owned_by_applicant(session: &Session) -> AppResult<bool> {
  match session.get(OWNED_BY_APPLICANT).await? {
    Some(answer) => Ok(answer == YES),
    None => Err(AppError::MissingAnswer(OWNED_BY_APPLICANT)),
  }
}

pub async fn contact_details(session: &Session, role: Role) -> AppResult<Option<ContactDetails>> {
  Ok(session.get_json(&role_key(role, CONTACT_DETAILS)).await?)
}

/// Contact details of whoever is applying: the owner when they own the item
pub async fn applicant_contact_details(session: &Session) -> AppResult<Option<ContactDetails>> {
  let role = if owned_by_applicant(session).await? {
    Role::Owner
  } else {
    Role::Applicant
  };
  contact_details(session, role).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::{MemoryStore, SessionStore};
  use std::sync::Arc;

  fn session() -> Session {
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new(1));
    Session::new("s", store)
  }

  #[test]
  fn test_role_keys() {
    assert_eq!(role_key(Role::Owner, CONTACT_DETAILS), "owner.contactDetails");
    assert_eq!(role_key(Role::Applicant, ADDRESS), "applicant.address");
  }

  #[test]
  fn test_description_uses_form_field_names() {
    let description = ItemDescription {
      what_is_item: "Chest".into(),
      where_is_ivory: "Inlay".into(),
      ..Default::default()
    };
    let json = serde_json::to_value(&description).unwrap();
    assert_eq!(json["whatIsItem"], "Chest");
    assert_eq!(json["whereIsIvory"], "Inlay");
  }

  #[tokio::test]
  async fn test_item_type_missing_or_unknown() {
    let session = session();
    assert!(matches!(item_type(&session).await, Err(AppError::MissingAnswer(_))));

    session.set(ITEM_TYPE, "bogus").await.unwrap();
    assert!(matches!(item_type(&session).await, Err(AppError::MissingAnswer(_))));

    session.set(ITEM_TYPE, "musical").await.unwrap();
    assert_eq!(item_type(&session).await.unwrap(), ItemType::Musical);
  }

  #[tokio::test]
  async fn test_owned_by_applicant() {
    let session = session();
    assert!(owned_by_applicant(&session).await.is_err());
    session.set(OWNED_BY_APPLICANT, "No").await.unwrap();
    assert!(!owned_by_applicant(&session).await.unwrap());
    session.set(OWNED_BY_APPLICANT, "Yes").await.unwrap();
    assert!(owned_by_applicant(&session).await.unwrap());
  }

  #[tokio::test]
  async fn test_applicant_is_owner_when_they_own_it() {
    let session = session();
    let owner = ContactDetails {
      name: "Olive".into(),
      ..Default::default()
    };
    let agent = ContactDetails {
      name: "Andy".into(),
      ..Default::default()
    };
    session.set_json(&role_key(Role::Owner, CONTACT_DETAILS), &owner).await.unwrap();
    session.set_json(&role_key(Role::Applicant, CONTACT_DETAILS), &agent).await.unwrap();

    session.set(OWNED_BY_APPLICANT, "Yes").await.unwrap();
    assert_eq!(applicant_contact_details(&session).await.unwrap().unwrap().name, "Olive");
    session.set(OWNED_BY_APPLICANT, "No").await.unwrap();
    assert_eq!(applicant_contact_details(&session).await.unwrap().unwrap().name, "Andy");
  }
}

//! Postcode address lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_status, ServiceError};

const SERVICE: &str = "address lookup";

/// Results requested per page
const PAGE_SIZE: usize = 100;

/// Upper bound on pages fetched for one postcode
const MAX_PAGES: usize = 10;

/// One address as returned by the lookup API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Address {
  #[serde(rename = "UPRN", default)]
  pub uprn: String,
  #[serde(default)]
  pub address_line: String,
  #[serde(default)]
  pub sub_building_name: Option<String>,
  #[serde(default)]
  pub building_name: Option<String>,
  #[serde(default)]
  pub building_number: Option<String>,
  #[serde(default)]
  pub street: Option<String>,
  #[serde(default)]
  pub town: Option<String>,
  #[serde(default)]
  pub postcode: String,
}

#[derive(Debug, Deserialize)]
struct LookupPage {
  header: LookupHeader,
  #[serde(default)]
  results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupHeader {
  #[serde(rename = "totalresults")]
  total_results: usize,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
  #[serde(rename = "Address")]
  address: Address,
}

#[async_trait]
pub trait AddressLookup: Send + Sync {
  /// Every address at a postcode
  async fn find_by_postcode(&self, postcode: &str) -> Result<Vec<Address>, ServiceError>;
}

pub struct AddressLookupClient {
  http: reqwest::Client,
  url: String,
  api_key: String,
}

impl AddressLookupClient {
  pub fn new(http: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self {
      http,
      url: url.into(),
      api_key: api_key.into(),
    }
  }

  async fn fetch_page(&self, postcode: &str, offset: usize) -> Result<LookupPage, ServiceError> {
    let offset = offset.to_string();
    let page_size = PAGE_SIZE.to_string();
    let mut request = self.http.get(&self.url).query(&[
      ("postcode", postcode),
      ("offset", offset.as_str()),
      ("maxresults", page_size.as_str()),
    ]);
    if !self.api_key.is_empty() {
      request = request.query(&[("key", self.api_key.as_str())]);
    }
    let response = check_status(SERVICE, request.send().await?).await?;
    Ok(response.json().await?)
  }
}

#[async_trait]
impl AddressLookup for AddressLookupClient {
  async fn find_by_postcode(&self, postcode: &str) -> Result<Vec<Address>, ServiceError> {
    let mut addresses = Vec::new();
    for page in 0..MAX_PAGES {
      let result = self.fetch_page(postcode, addresses.len()).await?;
      let fetched = result.results.len();
      addresses.extend(result.results.into_iter().map(|r| r.address));
      if fetched == 0 || addresses.len() >= result.header.total_results {
        break;
      }
      if page + 1 == MAX_PAGES {
        tracing::warn!(
          "Address lookup for {} stopped after {} pages ({} of {} results)",
          postcode,
          MAX_PAGES,
          addresses.len(),
          result.header.total_results
        );
      }
    }
    tracing::debug!("Address lookup for {} returned {} results", postcode, addresses.len());
    Ok(addresses)
  }
}

/// Keep addresses whose building number equals the term, or whose building
/// name, sub-building name or address line contains it (ignoring case)
pub fn filter_by_name_or_number(addresses: Vec<Address>, term: &str) -> Vec<Address> {
  let term = term.trim().to_lowercase();
  if term.is_empty() {
    return addresses;
  }
  let contains = |field: &Option<String>| {
    field
      .as_deref()
      .map(|v| v.to_lowercase().contains(&term))
      .unwrap_or(false)
  };
  addresses
    .into_iter()
    .filter(|a| {
      a.building_number
        .as_deref()
        .map(|n| n.to_lowercase() == term)
        .unwrap_or(false)
        || contains(&a.building_name)
        || contains(&a.sub_building_name)
        || a.address_line.to_lowercase().contains(&term)
    })
    .collect()
}

/// Look up a postcode and apply the optional name/number filter
pub async fn search(
  lookup: &dyn AddressLookup,
  postcode: &str,
  name_or_number: Option<&str>,
) -> Result<Vec<Address>, ServiceError> {
  let addresses = lookup.find_by_postcode(postcode).await?;
  Ok(match name_or_number {
    Some(term) => filter_by_name_or_number(addresses, term),
    None => addresses,
  })
}

//! Address pages, shared by the owner and applicant.
//!
//! The user searches by postcode, then either confirms the single match,
//! picks from a list, or types the address in. Addresses outside the UK
//! are entered as free text.

use axum::{
  extract::State,
  http::StatusCode,
  Form,
};
use std::collections::HashMap;

use super::contact::{perspective, Perspective};
use super::{ChoiceTemplate, FieldView, FormTemplate, LinkView, OptionView, RolePath};
use crate::answers::{self, role_key, AddressSearch, ADDRESS, ADDRESS_RESULTS, ADDRESS_SEARCH};
use crate::error::{redirect, render, render_with_status, AppResult};
use crate::flow::{self, Page, Role};
use crate::services::address::{self, Address};
use crate::session::{Session, SessionError};
use crate::state::AppState;
use crate::validation::{self as v, ErrorSummary};

const POSTCODE: &str = "postcode";
const NAME_OR_NUMBER: &str = "nameOrNumber";
const CHOICE: &str = "address";
const LINE_1: &str = "addressLine1";
const LINE_2: &str = "addressLine2";
const TOWN: &str = "townOrCity";
const INTERNATIONAL: &str = "internationalAddress";

const MAX_NAME_OR_NUMBER: usize = 100;
const MAX_LENGTH: usize = 4000;
const TOO_LONG: &str = "Must be 4,000 characters or fewer";

async fn title(session: &Session, role: Role, own: &str, owner: &str) -> AppResult<String> {
  Ok(match perspective(session, role).await? {
    Perspective::Own => own.to_string(),
    Perspective::OwnerOnBehalf => owner.to_string(),
  })
}

fn manual_links(role: Role) -> Vec<LinkView> {
  vec![
    LinkView {
      href: Page::AddressEnter(role).path(),
      text: "Enter the address manually",
    },
    LinkView {
      href: Page::AddressInternational(role).path(),
      text: "The address is outside the UK",
    },
  ]
}

async fn stored_results(session: &Session, role: Role) -> AppResult<Vec<Address>> {
  Ok(session.get_json(&role_key(role, ADDRESS_RESULTS)).await?.unwrap_or_default())
}

/// Save the chosen address and move on
async fn store_and_continue(session: &Session, role: Role, address: String) -> AppResult {
  session.set(&role_key(role, ADDRESS), &address).await?;
  let owned = match role {
    Role::Owner => answers::owned_by_applicant(session).await?,
    Role::Applicant => false,
  };
  Ok(redirect(flow::after_address(role, owned).path()))
}

// ============================================================================
// Find by postcode
// ============================================================================

async fn find_view(session: &Session, role: Role, search: &AddressSearch) -> AppResult<FormTemplate> {
  let title = title(session, role, "What is your address?", "What is the owner’s address?").await?;
  let mut template = FormTemplate::new(
    title,
    Page::AddressFind(role).path(),
    vec![
      FieldView::text(NAME_OR_NUMBER, "Property name or number (optional)", search.name_or_number.as_deref())
        .hint("For example, 15 or Prospect Cottage"),
      FieldView::text(POSTCODE, "Postcode", Some(&search.postcode)),
    ],
  );
  template.links = manual_links(role);
  template.button = "Find address";
  Ok(template)
}

pub async fn address_find(session: Session, RolePath(role): RolePath) -> AppResult {
  let search: AddressSearch = session
    .get_json(&role_key(role, ADDRESS_SEARCH))
    .await?
    .unwrap_or_default();
  render(&find_view(&session, role, &search).await?)
}

pub async fn address_find_post(
  State(state): State<AppState>,
  session: Session,
  RolePath(role): RolePath,
  Form(form): Form<HashMap<String, String>>,
) -> AppResult {
  let postcode = form.get(POSTCODE).map(String::as_str);
  let name_or_number = form.get(NAME_OR_NUMBER).map(String::as_str);

  let mut errors = ErrorSummary::new();
  v::check_optional_text(
    &mut errors,
    NAME_OR_NUMBER,
    name_or_number,
    MAX_NAME_OR_NUMBER,
    "Must be 100 characters or fewer",
  );
  v::check_postcode(&mut errors, POSTCODE, postcode);

  if !errors.is_empty() {
    // Show back what was typed; only a valid postcode gets normalised
    let typed = AddressSearch {
      postcode: postcode.map(str::trim).unwrap_or_default().to_string(),
      name_or_number: v::clean(name_or_number),
    };
    let mut template = find_view(&session, role, &typed).await?;
    template.errors = errors;
    return render_with_status(StatusCode::BAD_REQUEST, &template);
  }

  let search = AddressSearch {
    postcode: postcode.map(v::format_postcode).unwrap_or_default(),
    name_or_number: v::clean(name_or_number),
  };

  let results = match address::search(
    state.address_lookup.as_ref(),
    &search.postcode,
    search.name_or_number.as_deref(),
  )
  .await
  {
    Ok(results) => results,
    Err(e) => {
      tracing::warn!("Address lookup for {} failed: {}", search.postcode, e);
      let mut template = find_view(&session, role, &search).await?;
      template.errors = ErrorSummary::single(
        POSTCODE,
        "We could not look up addresses at the moment. Enter the address manually",
      );
      return render_with_status(StatusCode::SERVICE_UNAVAILABLE, &template);
    }
  };

  let next = flow::after_address_search(role, results.len());
  let search_key = role_key(role, ADDRESS_SEARCH);
  let results_key = role_key(role, ADDRESS_RESULTS);
  let encoded_search = serde_json::to_string(&search).map_err(SessionError::from)?;
  let encoded_results = serde_json::to_string(&results).map_err(SessionError::from)?;
  session
    .set_many(&[(search_key.as_str(), encoded_search), (results_key.as_str(), encoded_results)])
    .await?;
  Ok(redirect(next.path()))
}

// ============================================================================
// Choose from several results
// ============================================================================

async fn choose_view(session: &Session, role: Role, results: &[Address], current: Option<&str>) -> AppResult<ChoiceTemplate> {
  let title = title(session, role, "Choose your address", "Choose the owner’s address").await?;
  let options = results
    .iter()
    .enumerate()
    .map(|(i, a)| OptionView::new(i.to_string(), a.address_line.clone(), current == Some(a.address_line.as_str())))
    .collect();
  let mut template = ChoiceTemplate::radios(title, Page::AddressChoose(role).path(), CHOICE, options);
  template.links = manual_links(role);
  Ok(template)
}

pub async fn address_choose(session: Session, RolePath(role): RolePath) -> AppResult {
  let results = stored_results(&session, role).await?;
  if results.is_empty() {
    return Ok(redirect(Page::AddressFind(role).path()));
  }
  let current = session.get(&role_key(role, ADDRESS)).await?;
  render(&choose_view(&session, role, &results, current.as_deref()).await?)
}

pub async fn address_choose_post(
  session: Session,
  RolePath(role): RolePath,
  Form(form): Form<HashMap<String, String>>,
) -> AppResult {
  let results = stored_results(&session, role).await?;
  if results.is_empty() {
    return Ok(redirect(Page::AddressFind(role).path()));
  }

  let chosen = form
    .get(CHOICE)
    .and_then(|i| i.trim().parse::<usize>().ok())
    .and_then(|i| results.get(i));

  match chosen {
    Some(address) => store_and_continue(&session, role, address.address_line.clone()).await,
    None => {
      let mut template = choose_view(&session, role, &results, None).await?;
      template.errors = ErrorSummary::single(CHOICE, "You must choose an address");
      render_with_status(StatusCode::BAD_REQUEST, &template)
    }
  }
}

// ============================================================================
// Confirm the only result
// ============================================================================

pub async fn address_confirm(session: Session, RolePath(role): RolePath) -> AppResult {
  let results = stored_results(&session, role).await?;
  let Some(address) = results.first() else {
    return Ok(redirect(Page::AddressFind(role).path()));
  };
  let title = title(&session, role, "Is this your address?", "Is this the owner’s address?").await?;
  let mut template = FormTemplate::new(title, Page::AddressConfirm(role).path(), Vec::new());
  template.intro = vec![address.address_line.clone()];
  template.links = manual_links(role);
  template.button = "Use this address";
  render(&template)
}

pub async fn address_confirm_post(session: Session, RolePath(role): RolePath) -> AppResult {
  let results = stored_results(&session, role).await?;
  match results.into_iter().next() {
    Some(address) => store_and_continue(&session, role, address.address_line).await,
    None => Ok(redirect(Page::AddressFind(role).path())),
  }
}

// ============================================================================
// Manual UK address
// ============================================================================

async fn enter_view(session: &Session, role: Role, form: &HashMap<String, String>) -> AppResult<FormTemplate> {
  let title = title(session, role, "Enter your address", "Enter the owner’s address").await?;
  let get = |name: &str| form.get(name).map(String::as_str);
  Ok(FormTemplate::new(
    title,
    Page::AddressEnter(role).path(),
    vec![
      FieldView::text(LINE_1, "Building and street line 1", get(LINE_1)),
      FieldView::text(LINE_2, "Building and street line 2 (optional)", get(LINE_2)),
      FieldView::text(TOWN, "Town or city", get(TOWN)),
      FieldView::text(POSTCODE, "Postcode", get(POSTCODE)),
    ],
  ))
}

pub async fn address_enter(session: Session, RolePath(role): RolePath) -> AppResult {
  // Carry the searched postcode over so it doesn't have to be typed twice
  let mut form = HashMap::new();
  if let Some(search) = session.get_json::<AddressSearch>(&role_key(role, ADDRESS_SEARCH)).await? {
    form.insert(POSTCODE.to_string(), search.postcode);
  }
  render(&enter_view(&session, role, &form).await?)
}

pub async fn address_enter_post(
  session: Session,
  RolePath(role): RolePath,
  Form(form): Form<HashMap<String, String>>,
) -> AppResult {
  let get = |name: &str| form.get(name).map(String::as_str);
  let mut errors = ErrorSummary::new();
  v::check_required_text(&mut errors, LINE_1, get(LINE_1), MAX_LENGTH, "Enter the building and street information", TOO_LONG);
  v::check_optional_text(&mut errors, LINE_2, get(LINE_2), MAX_LENGTH, TOO_LONG);
  v::check_required_text(&mut errors, TOWN, get(TOWN), MAX_LENGTH, "Enter a town or city", TOO_LONG);
  v::check_postcode(&mut errors, POSTCODE, get(POSTCODE));

  if !errors.is_empty() {
    let mut template = enter_view(&session, role, &form).await?;
    template.errors = errors;
    return render_with_status(StatusCode::BAD_REQUEST, &template);
  }

  let address = [
    v::clean(get(LINE_1)),
    v::clean(get(LINE_2)),
    v::clean(get(TOWN)),
    get(POSTCODE).map(v::format_postcode),
  ]
  .into_iter()
  .flatten()
  .collect::<Vec<_>>()
  .join(", ");
  store_and_continue(&session, role, address).await
}

// ============================================================================
// Address outside the UK
// ============================================================================

async fn international_view(session: &Session, role: Role, value: Option<&str>) -> AppResult<FormTemplate> {
  let title = title(session, role, "What is your address?", "What is the owner’s address?").await?;
  Ok(FormTemplate::new(
    title,
    Page::AddressInternational(role).path(),
    vec![FieldView::textarea(INTERNATIONAL, "Enter the full address", value).hint("Include the country")],
  ))
}

pub async fn address_international(session: Session, RolePath(role): RolePath) -> AppResult {
  render(&international_view(&session, role, None).await?)
}

pub async fn address_international_post(
  session: Session,
  RolePath(role): RolePath,
  Form(form): Form<HashMap<String, String>>,
) -> AppResult {
  let value = form.get(INTERNATIONAL).map(String::as_str);
  let mut errors = ErrorSummary::new();
  v::check_required_text(&mut errors, INTERNATIONAL, value, MAX_LENGTH, "Enter the address", TOO_LONG);

  if !errors.is_empty() {
    let mut template = international_view(&session, role, value).await?;
    template.errors = errors;
    return render_with_status(StatusCode::BAD_REQUEST, &template);
  }

  store_and_continue(&session, role, v::clean(value).unwrap_or_default()).await
}

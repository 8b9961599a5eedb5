//! Pages describing the item and how its exemption is proven.

use axum::{http::StatusCode, Form};
use std::collections::HashMap;

use super::{ChoiceTemplate, FieldView, FormTemplate, OptionView};
use crate::answers::{self, ItemDescription, IvoryAge, IvoryVolume};
use crate::error::{redirect, render, render_with_status, AppResult};
use crate::flow::{self, ItemType, Page};
use crate::session::Session;
use crate::validation::{self as v, ErrorSummary};

const OTHER_REASON: &str = "Other reason";
const OTHER_DETAIL_MAX: usize = 4000;
const OTHER_DETAIL_FIELD: &str = "otherReason";

type Fields = HashMap<String, String>;

fn field<'a>(form: &'a Fields, name: &str) -> Option<&'a str> {
  form.get(name).map(String::as_str)
}

// ============================================================================
// Describe the item
// ============================================================================

const WHAT_IS_ITEM: &str = "whatIsItem";
const WHERE_IS_IVORY: &str = "whereIsIvory";
const DISTINGUISHING_FEATURES: &str = "distinguishingFeatures";
const WHERE_MADE: &str = "whereMade";
const WHEN_MADE: &str = "whenMade";

fn describe_view(description: &ItemDescription) -> FormTemplate {
  FormTemplate::new(
    "Tell us about the item",
    Page::DescribeTheItem.path(),
    vec![
      FieldView::text(WHAT_IS_ITEM, "What is the item?", Some(&description.what_is_item))
        .hint("For example, a chest of drawers, a piano, a brooch"),
      FieldView::textarea(WHERE_IS_IVORY, "Where is the ivory on the item?", Some(&description.where_is_ivory))
        .hint("For example, the keys, the handles, the inlay"),
      FieldView::textarea(
        DISTINGUISHING_FEATURES,
        "Does the item have any distinguishing features or marks? (optional)",
        description.distinguishing_features.as_deref(),
      )
      .hint("For example, a serial number, a signature, damage or repairs"),
      FieldView::text(WHERE_MADE, "Where was it made? (optional)", description.where_made.as_deref()),
      FieldView::text(WHEN_MADE, "When was it made? (optional)", description.when_made.as_deref()),
    ],
  )
}

pub async fn describe_the_item(session: Session) -> AppResult {
  let description: ItemDescription = session.get_json(answers::DESCRIBE_ITEM).await?.unwrap_or_default();
  render(&describe_view(&description))
}

pub async fn describe_the_item_post(session: Session, Form(form): Form<Fields>) -> AppResult {
  let mut errors = ErrorSummary::new();
  v::check_required_text(
    &mut errors,
    WHAT_IS_ITEM,
    field(&form, WHAT_IS_ITEM),
    300,
    "Tell us what the item is",
    "Must be 300 characters or fewer",
  );
  v::check_required_text(
    &mut errors,
    WHERE_IS_IVORY,
    field(&form, WHERE_IS_IVORY),
    500,
    "Tell us where the ivory is on the item",
    "Must be 500 characters or fewer",
  );
  v::check_optional_text(
    &mut errors,
    DISTINGUISHING_FEATURES,
    field(&form, DISTINGUISHING_FEATURES),
    1000,
    "Must be 1,000 characters or fewer",
  );
  v::check_optional_text(&mut errors, WHERE_MADE, field(&form, WHERE_MADE), 300, "Must be 300 characters or fewer");
  v::check_optional_text(&mut errors, WHEN_MADE, field(&form, WHEN_MADE), 300, "Must be 300 characters or fewer");

  let description = ItemDescription {
    what_is_item: v::clean(field(&form, WHAT_IS_ITEM)).unwrap_or_default(),
    where_is_ivory: v::clean(field(&form, WHERE_IS_IVORY)).unwrap_or_default(),
    distinguishing_features: v::clean(field(&form, DISTINGUISHING_FEATURES)),
    where_made: v::clean(field(&form, WHERE_MADE)),
    when_made: v::clean(field(&form, WHEN_MADE)),
  };

  if !errors.is_empty() {
    let mut template = describe_view(&description);
    template.errors = errors;
    return render_with_status(StatusCode::BAD_REQUEST, &template);
  }

  session.set_json(answers::DESCRIBE_ITEM, &description).await?;
  Ok(redirect(Page::UploadPhotos.path()))
}

// ============================================================================
// Ivory volume
// ============================================================================

const IVORY_VOLUME_FIELD: &str = "ivoryVolume";

const VOLUME_REASONS: &[&str] = &[
  "It’s clear from looking at it",
  "I measured it",
  "I have written verification from a relevant expert",
  OTHER_REASON,
];

fn volume_title(item_type: ItemType) -> String {
  match item_type.ivory_percentage() {
    Some(percentage) => format!("How do you know the item has less than {}% ivory by volume?", percentage),
    None => "How do you know how much ivory the item contains?".to_string(),
  }
}

fn detail_field(value: Option<&str>) -> FieldView {
  FieldView::textarea(OTHER_DETAIL_FIELD, "Give details", value)
}

fn volume_view(item_type: ItemType, answer: &IvoryVolume) -> ChoiceTemplate {
  let options = VOLUME_REASONS
    .iter()
    .map(|reason| OptionView {
      reveals_detail: *reason == OTHER_REASON,
      ..OptionView::new(*reason, *reason, answer.reason == *reason)
    })
    .collect();
  let mut template = ChoiceTemplate::radios(
    volume_title(item_type),
    Page::IvoryVolume.path(),
    IVORY_VOLUME_FIELD,
    options,
  );
  template.detail = Some(detail_field(answer.other_reason.as_deref()));
  template
}

pub async fn ivory_volume(session: Session) -> AppResult {
  let item_type = answers::item_type(&session).await?;
  let answer: IvoryVolume = session.get_json(answers::IVORY_VOLUME).await?.unwrap_or_default();
  render(&volume_view(item_type, &answer))
}

pub async fn ivory_volume_post(session: Session, Form(form): Form<Fields>) -> AppResult {
  let item_type = answers::item_type(&session).await?;
  let reason = field(&form, IVORY_VOLUME_FIELD)
    .map(str::trim)
    .filter(|r| VOLUME_REASONS.contains(r));
  let other = field(&form, OTHER_DETAIL_FIELD);

  let mut errors = ErrorSummary::new();
  match reason {
    None => errors.push(IVORY_VOLUME_FIELD, "You must tell us how you know the item’s ivory volume"),
    Some(OTHER_REASON) => v::check_required_text(
      &mut errors,
      OTHER_DETAIL_FIELD,
      other,
      OTHER_DETAIL_MAX,
      "You must give a reason",
      "Must be 4,000 characters or fewer",
    ),
    Some(_) => {}
  }

  let answer = IvoryVolume {
    reason: reason.unwrap_or_default().to_string(),
    other_reason: if reason == Some(OTHER_REASON) { v::clean(other) } else { None },
  };

  if !errors.is_empty() {
    let mut template = volume_view(item_type, &answer);
    template.errors = errors;
    return render_with_status(StatusCode::BAD_REQUEST, &template);
  }

  session.set_json(answers::IVORY_VOLUME, &answer).await?;
  Ok(redirect(Page::IvoryAge.path()))
}

// ============================================================================
// Ivory age
// ============================================================================

const IVORY_AGE_FIELD: &str = "ivoryAge";

fn age_reasons(item_type: ItemType) -> Vec<String> {
  let made_before = item_type.made_before().unwrap_or("the cut-off date");
  vec![
    "It has a stamp, serial number or signature to prove its age".to_string(),
    "I have a dated receipt showing when it was bought or repaired".to_string(),
    "I have a dated publication that shows or describes the item".to_string(),
    format!("It’s been in the family since before {}", made_before),
    "I have written verification from a relevant expert".to_string(),
    "I am an expert, and it’s my professional opinion".to_string(),
    OTHER_REASON.to_string(),
  ]
}

fn age_view(item_type: ItemType, answer: &IvoryAge) -> ChoiceTemplate {
  let options = age_reasons(item_type)
    .into_iter()
    .map(|reason| {
      let checked = answer.reasons.contains(&reason);
      OptionView {
        reveals_detail: reason == OTHER_REASON,
        ..OptionView::new(reason.clone(), reason, checked)
      }
    })
    .collect();
  let title = match item_type.made_before() {
    Some(date) => format!("How do you know the item was made before {}?", date),
    None => "How do you know how old the item is?".to_string(),
  };
  let mut template = ChoiceTemplate::radios(title, Page::IvoryAge.path(), IVORY_AGE_FIELD, options);
  template.multiple = true;
  template.hint = Some("Select all that apply.");
  template.detail = Some(detail_field(answer.other_reason.as_deref()));
  template
}

pub async fn ivory_age(session: Session) -> AppResult {
  let item_type = answers::item_type(&session).await?;
  let answer: IvoryAge = session.get_json(answers::IVORY_AGE).await?.unwrap_or_default();
  render(&age_view(item_type, &answer))
}

/// Checkboxes arrive as repeated fields, so the form is kept as pairs
pub async fn ivory_age_post(session: Session, Form(form): Form<Vec<(String, String)>>) -> AppResult {
  let item_type = answers::item_type(&session).await?;
  let allowed = age_reasons(item_type);
  let reasons: Vec<String> = form
    .iter()
    .filter(|(name, value)| name == IVORY_AGE_FIELD && allowed.contains(value))
    .map(|(_, value)| value.clone())
    .collect();
  let other = form
    .iter()
    .find(|(name, _)| name == OTHER_DETAIL_FIELD)
    .map(|(_, value)| value.as_str());
  let wants_other = reasons.iter().any(|r| r == OTHER_REASON);

  let mut errors = ErrorSummary::new();
  if reasons.is_empty() {
    errors.push(IVORY_AGE_FIELD, "You must tell us how you know the item’s age");
  } else if wants_other {
    v::check_required_text(
      &mut errors,
      OTHER_DETAIL_FIELD,
      other,
      OTHER_DETAIL_MAX,
      "You must give a reason",
      "Must be 4,000 characters or fewer",
    );
  }

  let answer = IvoryAge {
    reasons,
    other_reason: if wants_other { v::clean(other) } else { None },
  };

  if !errors.is_empty() {
    let mut template = age_view(item_type, &answer);
    template.errors = errors;
    return render_with_status(StatusCode::BAD_REQUEST, &template);
  }

  session.set_json(answers::IVORY_AGE, &answer).await?;
  Ok(redirect(flow::after_ivory_age(item_type).path()))
}

// ============================================================================
// Why RMI, where is the item
// ============================================================================

const WHY_RMI_FIELD: &str = "whyRmi";
const WHERE_IS_ITEM_FIELD: &str = "whereIsItem";

fn why_rmi_view(value: Option<&str>) -> FormTemplate {
  let mut template = FormTemplate::new(
    "Why is your item of outstandingly high artistic, cultural or historical value?",
    Page::WhyRmi.path(),
    vec![FieldView::textarea(WHY_RMI_FIELD, "Explain why", value)
      .hint("Include any evidence, such as expert opinions or references in publications.")],
  );
  template.intro = vec!["The item must be a rare and important example of its type.".to_string()];
  template
}

pub async fn why_rmi(session: Session) -> AppResult {
  let value = session.get(answers::WHY_RMI).await?;
  render(&why_rmi_view(value.as_deref()))
}

pub async fn why_rmi_post(session: Session, Form(form): Form<Fields>) -> AppResult {
  let value = field(&form, WHY_RMI_FIELD);
  let mut errors = ErrorSummary::new();
  v::check_required_text(
    &mut errors,
    WHY_RMI_FIELD,
    value,
    OTHER_DETAIL_MAX,
    "You must explain why your item is of outstandingly high artistic, cultural or historical value",
    "Must be 4,000 characters or fewer",
  );
  if !errors.is_empty() {
    let mut template = why_rmi_view(value);
    template.errors = errors;
    return render_with_status(StatusCode::BAD_REQUEST, &template);
  }
  session
    .set(answers::WHY_RMI, &v::clean(value).unwrap_or_default())
    .await?;
  Ok(redirect(Page::WhereIsItem.path()))
}

pub async fn where_is_item(session: Session) -> AppResult {
  let value = session.get(answers::WHERE_IS_ITEM).await?;
  render(&FormTemplate::new(
    "Where is the item?",
    Page::WhereIsItem.path(),
    vec![FieldView::textarea(WHERE_IS_ITEM_FIELD, "Where is the item currently kept?", value.as_deref())],
  ))
}

/// The location is free text with no constraints
pub async fn where_is_item_post(session: Session, Form(form): Form<Fields>) -> AppResult {
  let value = v::clean(field(&form, WHERE_IS_ITEM_FIELD)).unwrap_or_default();
  session.set(answers::WHERE_IS_ITEM, &value).await?;
  Ok(redirect(Page::IntoOutOfGb.path()))
}

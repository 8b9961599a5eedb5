//! Single-answer radio pages driven by the question table.

use axum::http::StatusCode;
use std::collections::HashMap;

use super::{ChoiceTemplate, OptionView};
use crate::analytics::EventType;
use crate::answers::ITEM_TYPE;
use crate::error::{redirect, render, render_with_status, AppResult};
use crate::flow::{self, Page, Question};
use crate::session::Session;
use crate::state::AppState;
use crate::validation::ErrorSummary;

const FIELD: &str = "answer";

fn view(question: &'static Question, current: Option<&str>) -> ChoiceTemplate {
  let options = question
    .options
    .iter()
    .map(|o| OptionView::new(o.value, o.label, current == Some(o.value)))
    .collect();
  let mut template = ChoiceTemplate::radios(question.title, question.page.path(), FIELD, options);
  template.hint = question.hint;
  template
}

pub async fn show(question: &'static Question, session: Session) -> AppResult {
  let current = session.get(question.key).await?;
  render(&view(question, current.as_deref()))
}

pub async fn submit(
  question: &'static Question,
  state: AppState,
  session: Session,
  form: HashMap<String, String>,
) -> AppResult {
  // Anything that isn't one of the offered options counts as no answer
  let answer = form
    .get(FIELD)
    .map(|a| a.trim())
    .filter(|a| question.options.iter().any(|o| o.value == *a));

  let Some(answer) = answer else {
    return match question.required {
      Some(message) => {
        let mut template = view(question, None);
        template.errors = ErrorSummary::single(FIELD, message);
        render_with_status(StatusCode::BAD_REQUEST, &template)
      }
      None => Ok(redirect(question.fallback.unwrap_or(Page::Start).path())),
    };
  };

  let branch = flow::branch(question.page, answer);
  let mut entries = vec![(question.key, answer.to_string())];
  if let Some(item_type) = branch.and_then(|b| b.item_type) {
    if question.key != ITEM_TYPE {
      entries.push((ITEM_TYPE, item_type.code().to_string()));
    }
  }
  session.set_many(&entries).await?;

  if question.track {
    state.analytics.track(
      session.id(),
      EventType::Answer {
        category: "Eligibility checker".into(),
        action: question.title.into(),
        label: answer.into(),
      },
    );
  }

  let next = branch.map(|b| b.to).or(question.fallback).unwrap_or(Page::Start);
  Ok(redirect(next.path()))
}

//! Page catalogue and branching rules.
//!
//! Every page of the service is a [`Page`]. Radio questions whose next page
//! depends only on the answer are described once in [`QUESTIONS`] and
//! [`BRANCHES`]; the handful of transitions that depend on earlier answers
//! (item type, ownership, address search size, payment state) are the
//! functions at the bottom of this module. Handlers and tests both read from
//! here, so a route's next page is defined in exactly one place.

use serde::Deserialize;

use crate::config::MAX_ADDRESS_CHOICES;

pub const YES: &str = "Yes";
pub const NO: &str = "No";
pub const DONT_KNOW: &str = "I don't know";

// ============================================================================
// Item types
// ============================================================================

/// Legal route an application follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
  /// Exemption certificate for an item of outstandingly high value
  Two,
  /// Self-declaration registration
  Ten,
}

/// Exemption category, decided by the eligibility checker or chosen directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
  Musical,
  TenPercent,
  Miniature,
  Museum,
  HighValue,
}

impl ItemType {
  pub const ALL: [ItemType; 5] = [
    ItemType::TenPercent,
    ItemType::Musical,
    ItemType::Miniature,
    ItemType::Museum,
    ItemType::HighValue,
  ];

  /// Stable value stored in the session
  pub fn code(self) -> &'static str {
    match self {
      ItemType::Musical => "musical",
      ItemType::TenPercent => "ten-percent",
      ItemType::Miniature => "miniature",
      ItemType::Museum => "museum",
      ItemType::HighValue => "high-value",
    }
  }

  pub fn from_code(code: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|t| t.code() == code)
  }

  pub fn label(self) -> &'static str {
    match self {
      ItemType::Musical => "Musical instrument made before 1975 with less than 20% ivory",
      ItemType::TenPercent => "Item made before 3 March 1947 with less than 10% ivory",
      ItemType::Miniature => {
        "Portrait miniature made before 1918 with a surface area less than 320 square centimetres"
      }
      ItemType::Museum => "Item to be sold or hired out to a qualifying museum",
      ItemType::HighValue => {
        "Item made before 1918 that has outstandingly high artistic, cultural or historical value"
      }
    }
  }

  pub fn section(self) -> Section {
    match self {
      ItemType::HighValue => Section::Two,
      _ => Section::Ten,
    }
  }

  /// Date the item must have been made before, as shown in questions
  pub fn made_before(self) -> Option<&'static str> {
    match self {
      ItemType::Musical => Some("1975"),
      ItemType::TenPercent => Some("3 March 1947"),
      ItemType::Miniature | ItemType::HighValue => Some("1918"),
      ItemType::Museum => None,
    }
  }

  /// Maximum ivory content by volume, for the types that have one
  pub fn ivory_percentage(self) -> Option<u8> {
    match self {
      ItemType::Musical => Some(20),
      ItemType::TenPercent => Some(10),
      _ => None,
    }
  }
}

// ============================================================================
// Pages
// ============================================================================

/// Whose details a user-details page collects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Owner,
  Applicant,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Role::Owner => "owner",
      Role::Applicant => "applicant",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
  Start,
  // Eligibility checker
  ContainElephantIvory,
  SellingToMuseum,
  AreYouAMuseum,
  IsItAMusicalInstrument,
  MadeBefore1975,
  LessThan20Ivory,
  IsItAPortraitMiniature,
  MadeBefore1918,
  LessThan320cmSquared,
  IsItRmi,
  RmiAndPre1918,
  MadeBefore1947,
  LessThan10Percent,
  IvoryAdded,
  TakenFromElephant,
  DoNotNeedService,
  CannotTrade,
  CannotContinue,
  // Application
  CanContinue,
  WhatTypeOfItemIsIt,
  LegalResponsibility,
  DescribeTheItem,
  UploadPhotos,
  YourPhotos,
  IvoryVolume,
  IvoryAge,
  WhyRmi,
  WhereIsItem,
  IntoOutOfGb,
  UploadDocument,
  YourDocuments,
  WhoOwnsTheItem,
  ContactDetails(Role),
  AddressFind(Role),
  AddressChoose(Role),
  AddressConfirm(Role),
  AddressEnter(Role),
  AddressInternational(Role),
  IntentionForItem,
  CheckYourAnswers,
  MakePayment,
  ServiceComplete,
}

impl Page {
  pub fn path(self) -> &'static str {
    use Role::{Applicant, Owner};
    match self {
      Page::Start => "/",
      Page::ContainElephantIvory => "/eligibility-checker/contain-elephant-ivory",
      Page::SellingToMuseum => "/eligibility-checker/selling-to-museum",
      Page::AreYouAMuseum => "/eligibility-checker/are-you-a-museum",
      Page::IsItAMusicalInstrument => "/eligibility-checker/is-it-a-musical-instrument",
      Page::MadeBefore1975 => "/eligibility-checker/made-before-1975",
      Page::LessThan20Ivory => "/eligibility-checker/less-than-20-ivory",
      Page::IsItAPortraitMiniature => "/eligibility-checker/is-it-a-portrait-miniature",
      Page::MadeBefore1918 => "/eligibility-checker/made-before-1918",
      Page::LessThan320cmSquared => "/eligibility-checker/less-than-320cm-squared",
      Page::IsItRmi => "/eligibility-checker/is-it-rmi",
      Page::RmiAndPre1918 => "/eligibility-checker/rmi-and-pre-1918",
      Page::MadeBefore1947 => "/eligibility-checker/made-before-1947",
      Page::LessThan10Percent => "/eligibility-checker/less-than-10-percent",
      Page::IvoryAdded => "/eligibility-checker/ivory-added",
      Page::TakenFromElephant => "/eligibility-checker/taken-from-elephant",
      Page::DoNotNeedService => "/eligibility-checker/do-not-need-service",
      Page::CannotTrade => "/eligibility-checker/cannot-trade",
      Page::CannotContinue => "/eligibility-checker/cannot-continue",
      Page::CanContinue => "/can-continue",
      Page::WhatTypeOfItemIsIt => "/what-type-of-item-is-it",
      Page::LegalResponsibility => "/legal-responsibility",
      Page::DescribeTheItem => "/describe-the-item",
      Page::UploadPhotos => "/upload-photos",
      Page::YourPhotos => "/your-photos",
      Page::IvoryVolume => "/ivory-volume",
      Page::IvoryAge => "/ivory-age",
      Page::WhyRmi => "/why-rmi",
      Page::WhereIsItem => "/where-is-item",
      Page::IntoOutOfGb => "/into-out-of-gb",
      Page::UploadDocument => "/upload-document",
      Page::YourDocuments => "/your-documents",
      Page::WhoOwnsTheItem => "/who-owns-the-item",
      Page::ContactDetails(Owner) => "/user-details/owner/contact-details",
      Page::ContactDetails(Applicant) => "/user-details/applicant/contact-details",
      Page::AddressFind(Owner) => "/user-details/owner/address-find",
      Page::AddressFind(Applicant) => "/user-details/applicant/address-find",
      Page::AddressChoose(Owner) => "/user-details/owner/address-choose",
      Page::AddressChoose(Applicant) => "/user-details/applicant/address-choose",
      Page::AddressConfirm(Owner) => "/user-details/owner/address-confirm",
      Page::AddressConfirm(Applicant) => "/user-details/applicant/address-confirm",
      Page::AddressEnter(Owner) => "/user-details/owner/address-enter",
      Page::AddressEnter(Applicant) => "/user-details/applicant/address-enter",
      Page::AddressInternational(Owner) => "/user-details/owner/address-international",
      Page::AddressInternational(Applicant) => "/user-details/applicant/address-international",
      Page::IntentionForItem => "/intention-for-item",
      Page::CheckYourAnswers => "/check-your-answers",
      Page::MakePayment => "/make-payment",
      Page::ServiceComplete => "/service-complete",
    }
  }
}

// ============================================================================
// Radio questions
// ============================================================================

#[derive(Debug)]
pub struct AnswerOption {
  pub value: &'static str,
  pub label: &'static str,
}

const fn opt(value: &'static str) -> AnswerOption {
  AnswerOption { value, label: value }
}

const fn labelled(value: &'static str, label: &'static str) -> AnswerOption {
  AnswerOption { value, label }
}

const YES_NO_DONT_KNOW: &[AnswerOption] = &[opt(YES), opt(NO), opt(DONT_KNOW)];
const YES_NO: &[AnswerOption] = &[opt(YES), opt(NO)];

/// A single-answer radio page
#[derive(Debug)]
pub struct Question {
  pub page: Page,
  /// Session key the answer is stored under
  pub key: &'static str,
  pub title: &'static str,
  pub hint: Option<&'static str>,
  pub options: &'static [AnswerOption],
  /// Error shown when nothing is chosen; `None` means the page accepts no answer
  pub required: Option<&'static str>,
  /// Next page when no branch matches (only for pages without `required`)
  pub fallback: Option<Page>,
  /// Send an analytics event with the answer
  pub track: bool,
}

const fn eligibility(
  page: Page,
  key: &'static str,
  title: &'static str,
  hint: Option<&'static str>,
  options: &'static [AnswerOption],
  required: &'static str,
) -> Question {
  Question {
    page,
    key,
    title,
    hint,
    options,
    required: Some(required),
    fallback: None,
    track: true,
  }
}

pub static QUESTIONS: &[Question] = &[
  eligibility(
    Page::ContainElephantIvory,
    "containElephantIvory",
    "Does your item contain elephant ivory?",
    Some("Any ivory in your item must be ‘worked’ ivory. This means it has been carved or significantly altered from its original raw state."),
    YES_NO_DONT_KNOW,
    "Tell us whether your item contains elephant ivory",
  ),
  eligibility(
    Page::SellingToMuseum,
    "sellingToMuseum",
    "Are you selling or hiring your item out to a museum?",
    Some("The museum must be accredited by Arts Council England, the Welsh Government or Museums Galleries Scotland, or be a member of the International Council of Museums."),
    YES_NO_DONT_KNOW,
    "Tell us whether you are selling or hiring your item out to a museum",
  ),
  eligibility(
    Page::AreYouAMuseum,
    "areYouAMuseum",
    "Are you a museum?",
    None,
    YES_NO,
    "Tell us whether you are a museum",
  ),
  eligibility(
    Page::IsItAMusicalInstrument,
    "isItAMusicalInstrument",
    "Is your item a musical instrument?",
    None,
    YES_NO_DONT_KNOW,
    "Tell us whether your item is a musical instrument",
  ),
  eligibility(
    Page::MadeBefore1975,
    "madeBefore1975",
    "Was your musical instrument made before 1975?",
    None,
    YES_NO_DONT_KNOW,
    "Tell us whether your musical instrument was made before 1975",
  ),
  eligibility(
    Page::LessThan20Ivory,
    "lessThan20Ivory",
    "Does your musical instrument contain less than 20% ivory?",
    Some("Only count the ivory you can see from the outside of the instrument."),
    YES_NO_DONT_KNOW,
    "Tell us whether your musical instrument contains less than 20% ivory",
  ),
  eligibility(
    Page::IsItAPortraitMiniature,
    "isItAPortraitMiniature",
    "Is your item a portrait miniature?",
    Some("A portrait miniature is a small portrait painted on a thin sheet of ivory."),
    YES_NO_DONT_KNOW,
    "Tell us whether your item is a portrait miniature",
  ),
  eligibility(
    Page::MadeBefore1918,
    "madeBefore1918",
    "Was your portrait miniature made before 1918?",
    None,
    YES_NO_DONT_KNOW,
    "Tell us whether your portrait miniature was made before 1918",
  ),
  eligibility(
    Page::LessThan320cmSquared,
    "lessThan320cmSquared",
    "Is the surface area of the ivory less than 320 square centimetres?",
    Some("Only measure the parts of the portrait miniature you can see. Do not include the frame."),
    YES_NO_DONT_KNOW,
    "Tell us whether the surface area of the ivory is less than 320 square centimetres",
  ),
  eligibility(
    Page::IsItRmi,
    "isItRmi",
    "Does your item have outstandingly high artistic, cultural or historical value?",
    Some("The item must be a rare and important example of its type."),
    YES_NO_DONT_KNOW,
    "Tell us whether your item has outstandingly high artistic, cultural or historical value",
  ),
  eligibility(
    Page::RmiAndPre1918,
    "rmiAndPre1918",
    "Was your item made before 1918?",
    None,
    YES_NO_DONT_KNOW,
    "Tell us whether your item was made before 1918",
  ),
  eligibility(
    Page::MadeBefore1947,
    "madeBefore1947",
    "Was your item made before 3 March 1947?",
    None,
    YES_NO_DONT_KNOW,
    "Tell us whether your item was made before 3 March 1947",
  ),
  eligibility(
    Page::LessThan10Percent,
    "lessThan10Percent",
    "Is your item less than 10% ivory by volume?",
    None,
    YES_NO_DONT_KNOW,
    "Tell us whether your item is less than 10% ivory by volume",
  ),
  eligibility(
    Page::IvoryAdded,
    "ivoryAdded",
    "Has any replacement ivory been added to the item since it was made?",
    Some("This could have been to repair or restore damaged or missing parts."),
    YES_NO_DONT_KNOW,
    "Tell us whether any replacement ivory has been added to the item since it was made",
  ),
  eligibility(
    Page::TakenFromElephant,
    "takenFromElephant",
    "Was the replacement ivory taken from an elephant on or after 1 January 1975?",
    None,
    YES_NO_DONT_KNOW,
    "Tell us whether the replacement ivory was taken from an elephant on or after 1 January 1975",
  ),
  Question {
    page: Page::WhatTypeOfItemIsIt,
    key: crate::answers::ITEM_TYPE,
    title: "What type of ivory item do you want to register or certify?",
    hint: None,
    options: &[
      labelled("ten-percent", "Item made before 3 March 1947 with less than 10% ivory"),
      labelled("musical", "Musical instrument made before 1975 with less than 20% ivory"),
      labelled(
        "miniature",
        "Portrait miniature made before 1918 with a surface area less than 320 square centimetres",
      ),
      labelled("museum", "Item to be sold or hired out to a qualifying museum"),
      labelled(
        "high-value",
        "Item made before 1918 that has outstandingly high artistic, cultural or historical value",
      ),
    ],
    required: Some("Tell us what type of ivory you want to sell or hire out"),
    fallback: None,
    track: false,
  },
  Question {
    page: Page::IntoOutOfGb,
    key: crate::answers::INTO_OUT_OF_GB,
    title: "Is the item being moved into or out of Great Britain?",
    hint: None,
    options: &[
      labelled("Into", "Into Great Britain"),
      labelled("Out of", "Out of Great Britain"),
      labelled("Neither", "Neither"),
    ],
    required: None,
    fallback: Some(Page::UploadDocument),
    track: false,
  },
  Question {
    page: Page::WhoOwnsTheItem,
    key: crate::answers::OWNED_BY_APPLICANT,
    title: "Do you own the item?",
    hint: None,
    options: &[
      labelled(YES, "Yes, I own it"),
      labelled(NO, "No, I’m acting on behalf of the owner"),
    ],
    required: Some("Tell us whether you own the item"),
    fallback: None,
    track: false,
  },
  Question {
    page: Page::IntentionForItem,
    key: crate::answers::INTENTION,
    title: "What do you intend to do with the item?",
    hint: None,
    options: &[opt("Sell it"), opt("Hire it out")],
    required: Some("Tell us what you intend to do with the item"),
    fallback: None,
    track: false,
  },
];

pub fn question(page: Page) -> Option<&'static Question> {
  QUESTIONS.iter().find(|q| q.page == page)
}

// ============================================================================
// Branch table
// ============================================================================

/// One row of the decision tree: answering `answer` on `from` leads to `to`
#[derive(Debug)]
pub struct Branch {
  pub from: Page,
  pub answer: &'static str,
  pub to: Page,
  /// Item type this answer settles, if any
  pub item_type: Option<ItemType>,
}

const fn go(from: Page, answer: &'static str, to: Page) -> Branch {
  Branch {
    from,
    answer,
    to,
    item_type: None,
  }
}

const fn settles(from: Page, answer: &'static str, to: Page, item_type: ItemType) -> Branch {
  Branch {
    from,
    answer,
    to,
    item_type: Some(item_type),
  }
}

pub static BRANCHES: &[Branch] = &[
  go(Page::ContainElephantIvory, YES, Page::SellingToMuseum),
  go(Page::ContainElephantIvory, NO, Page::DoNotNeedService),
  go(Page::ContainElephantIvory, DONT_KNOW, Page::CannotContinue),
  go(Page::SellingToMuseum, YES, Page::AreYouAMuseum),
  go(Page::SellingToMuseum, NO, Page::IsItAMusicalInstrument),
  go(Page::SellingToMuseum, DONT_KNOW, Page::CannotContinue),
  go(Page::AreYouAMuseum, YES, Page::DoNotNeedService),
  settles(Page::AreYouAMuseum, NO, Page::CanContinue, ItemType::Museum),
  settles(Page::IsItAMusicalInstrument, YES, Page::MadeBefore1975, ItemType::Musical),
  go(Page::IsItAMusicalInstrument, NO, Page::IsItAPortraitMiniature),
  go(Page::IsItAMusicalInstrument, DONT_KNOW, Page::CannotContinue),
  go(Page::MadeBefore1975, YES, Page::LessThan20Ivory),
  go(Page::MadeBefore1975, NO, Page::CannotTrade),
  go(Page::MadeBefore1975, DONT_KNOW, Page::CannotContinue),
  go(Page::LessThan20Ivory, YES, Page::IvoryAdded),
  go(Page::LessThan20Ivory, NO, Page::CannotTrade),
  go(Page::LessThan20Ivory, DONT_KNOW, Page::CannotContinue),
  settles(Page::IsItAPortraitMiniature, YES, Page::MadeBefore1918, ItemType::Miniature),
  go(Page::IsItAPortraitMiniature, NO, Page::IsItRmi),
  go(Page::IsItAPortraitMiniature, DONT_KNOW, Page::CannotContinue),
  go(Page::MadeBefore1918, YES, Page::LessThan320cmSquared),
  go(Page::MadeBefore1918, NO, Page::CannotTrade),
  go(Page::MadeBefore1918, DONT_KNOW, Page::CannotContinue),
  go(Page::LessThan320cmSquared, YES, Page::IvoryAdded),
  go(Page::LessThan320cmSquared, NO, Page::CannotTrade),
  go(Page::LessThan320cmSquared, DONT_KNOW, Page::CannotContinue),
  settles(Page::IsItRmi, YES, Page::RmiAndPre1918, ItemType::HighValue),
  go(Page::IsItRmi, NO, Page::MadeBefore1947),
  go(Page::IsItRmi, DONT_KNOW, Page::CannotContinue),
  go(Page::RmiAndPre1918, YES, Page::IvoryAdded),
  go(Page::RmiAndPre1918, NO, Page::CannotTrade),
  go(Page::RmiAndPre1918, DONT_KNOW, Page::CannotContinue),
  settles(Page::MadeBefore1947, YES, Page::LessThan10Percent, ItemType::TenPercent),
  go(Page::MadeBefore1947, NO, Page::CannotTrade),
  go(Page::MadeBefore1947, DONT_KNOW, Page::CannotContinue),
  go(Page::LessThan10Percent, YES, Page::IvoryAdded),
  go(Page::LessThan10Percent, NO, Page::CannotTrade),
  go(Page::LessThan10Percent, DONT_KNOW, Page::CannotContinue),
  go(Page::IvoryAdded, YES, Page::TakenFromElephant),
  go(Page::IvoryAdded, NO, Page::CanContinue),
  go(Page::IvoryAdded, DONT_KNOW, Page::CannotContinue),
  go(Page::TakenFromElephant, YES, Page::CannotTrade),
  go(Page::TakenFromElephant, NO, Page::CanContinue),
  go(Page::TakenFromElephant, DONT_KNOW, Page::CannotContinue),
  settles(Page::WhatTypeOfItemIsIt, "ten-percent", Page::CanContinue, ItemType::TenPercent),
  settles(Page::WhatTypeOfItemIsIt, "musical", Page::CanContinue, ItemType::Musical),
  settles(Page::WhatTypeOfItemIsIt, "miniature", Page::CanContinue, ItemType::Miniature),
  settles(Page::WhatTypeOfItemIsIt, "museum", Page::CanContinue, ItemType::Museum),
  settles(Page::WhatTypeOfItemIsIt, "high-value", Page::CanContinue, ItemType::HighValue),
  go(Page::WhoOwnsTheItem, YES, Page::ContactDetails(Role::Owner)),
  go(Page::WhoOwnsTheItem, NO, Page::ContactDetails(Role::Owner)),
  go(Page::IntentionForItem, "Sell it", Page::CheckYourAnswers),
  go(Page::IntentionForItem, "Hire it out", Page::CheckYourAnswers),
];

/// Look up the branch for an answer on a page
pub fn branch(from: Page, answer: &str) -> Option<&'static Branch> {
  BRANCHES.iter().find(|b| b.from == from && b.answer == answer)
}

// ============================================================================
// Context-dependent transitions
// ============================================================================

/// After the photo list, depending on what has to be proven about the item
pub fn after_photos(item_type: ItemType) -> Page {
  match item_type {
    ItemType::Musical | ItemType::TenPercent => Page::IvoryVolume,
    ItemType::Miniature | ItemType::HighValue => Page::IvoryAge,
    ItemType::Museum => Page::WhoOwnsTheItem,
  }
}

pub fn after_ivory_age(item_type: ItemType) -> Page {
  match item_type.section() {
    Section::Two => Page::WhyRmi,
    Section::Ten => Page::WhoOwnsTheItem,
  }
}

/// Where an address search lands, by number of matches
pub fn after_address_search(role: Role, results: usize) -> Page {
  match results {
    0 => Page::AddressEnter(role),
    1 => Page::AddressConfirm(role),
    n if n <= MAX_ADDRESS_CHOICES => Page::AddressChoose(role),
    _ => Page::AddressEnter(role),
  }
}

/// Once an address is stored for `role`
pub fn after_address(role: Role, owned_by_applicant: bool) -> Page {
  match (role, owned_by_applicant) {
    (Role::Owner, true) => Page::IntentionForItem,
    (Role::Owner, false) => Page::ContactDetails(Role::Applicant),
    (Role::Applicant, _) => Page::IntentionForItem,
  }
}

/// GOV.UK Pay error code for a payment the user cancelled
pub const PAYMENT_CANCELLED_CODE: &str = "P0030";

#[derive(Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
  Complete,
  Redirect(Page),
}

/// Decide what to do when the user comes back from the payment provider
pub fn payment_outcome(status: &str, code: Option<&str>) -> PaymentOutcome {
  match (status, code) {
    ("success", _) => PaymentOutcome::Complete,
    ("failed", Some(PAYMENT_CANCELLED_CODE)) => PaymentOutcome::Redirect(Page::CheckYourAnswers),
    ("failed", _) => PaymentOutcome::Redirect(Page::MakePayment),
    ("error", _) => PaymentOutcome::Redirect(Page::CheckYourAnswers),
    _ => PaymentOutcome::Redirect(Page::CheckYourAnswers),
  }
}

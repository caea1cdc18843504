//! Page queries. Every caller-supplied value travels in the JSON argument object.

use cdp_adapter::PageScript;
use serde_json::json;

use crate::Selectors;

pub const EXTRACT_ENTRIES: &str = "extract_entries";
pub const DECISION_TARGETS: &str = "decision_targets";
pub const SUBMIT_VOTE: &str = "submit_vote";

const EXTRACT_ENTRIES_JS: &str = r#"
(args) => {
  const entries = [];
  document.querySelectorAll(args.container).forEach((node, index) => {
    const link = node.querySelector(args.link);
    if (!link || !link.href) {
      return;
    }
    const heading = node.querySelector(args.title);
    entries.push({
      index,
      title: heading ? heading.textContent.trim() : null,
      href: link.href,
    });
  });
  return entries;
}
"#;

const DECISION_TARGETS_JS: &str = r#"
(args) => Array.from(document.querySelectorAll(args.control)).map((input) => {
  const label = input.closest('label');
  const text = label ? label.querySelector(args.label) : null;
  return { id: input.value, title: text ? text.textContent.trim() : null };
})
"#;

const SUBMIT_VOTE_JS: &str = r#"
(args) => {
  const form = document.querySelector(args.form);
  if (!form) {
    return false;
  }
  if (args.winningId !== null) {
    const control = Array.from(form.querySelectorAll(args.control))
      .find((input) => input.value === args.winningId);
    if (control) {
      const label = control.closest('label');
      if (label) {
        label.click();
      } else {
        control.checked = true;
        control.dispatchEvent(new Event('change', { bubbles: true }));
      }
    }
  }
  const field = form.querySelector(args.rationaleField);
  if (field) {
    field.value = args.rationale;
    field.dispatchEvent(new Event('input', { bubbles: true }));
  }
  if (args.dryRun) {
    return true;
  }
  const submit = form.querySelector(args.submit);
  if (!submit) {
    return false;
  }
  submit.click();
  return true;
}
"#;

pub fn extract_entries(selectors: &Selectors) -> PageScript {
    PageScript::new(EXTRACT_ENTRIES, EXTRACT_ENTRIES_JS).with_args(json!({
        "container": selectors.entry_container,
        "link": selectors.entry_link,
        "title": selectors.entry_title,
    }))
}

pub fn decision_targets(selectors: &Selectors) -> PageScript {
    PageScript::new(DECISION_TARGETS, DECISION_TARGETS_JS).with_args(json!({
        "control": selectors.decision_control,
        "label": selectors.decision_label,
    }))
}

pub fn submit_vote(
    selectors: &Selectors,
    winning_id: Option<&str>,
    rationale: &str,
    dry_run: bool,
) -> PageScript {
    PageScript::new(SUBMIT_VOTE, SUBMIT_VOTE_JS).with_args(json!({
        "form": selectors.vote_form,
        "control": selectors.decision_control,
        "winningId": winning_id,
        "rationaleField": selectors.rationale_field,
        "rationale": rationale,
        "submit": selectors.submit_control,
        "dryRun": dry_run,
    }))
}

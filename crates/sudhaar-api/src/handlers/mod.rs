pub mod campaigns;
pub mod dashboard;
pub mod donations;
pub mod issues;
pub mod transparency;
pub mod users;

use crate::auth::push;
use crate::error::FieldErrors;
use crate::validators;

/// Required text field, optionally length-limited.
fn check_text(errors: &mut FieldErrors, field: &str, value: &str, max: Option<usize>) {
    if let Err(msg) = validators::required_text(value) {
        push(errors, field, msg);
    } else if let Some(Err(msg)) = max.map(|max| validators::max_length(value.trim(), max)) {
        push(errors, field, msg);
    }
}

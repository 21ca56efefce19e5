//! User-scoped projection of canonical conventions.

use super::{Convention, RegistrationLedger, TargetType, UserInfo};

/// Annotate an owned copy of `convention` with `ledger`'s registrations.
///
/// The convention receives [`UserInfo`] when the ledger holds a convention
/// item for it; each event receives one when the ledger holds an event item
/// for that event under this convention. Any stale projection is cleared.
pub(crate) fn scoped_to(convention: Convention, ledger: Option<&RegistrationLedger>) -> Convention {
    let mut view = convention.without_user_info();
    let Some(ledger) = ledger else {
        return view;
    };

    view.user_info = ledger
        .participants(TargetType::Convention, &view.id)
        .map(|count| UserInfo::new(ledger.user_id.clone(), count));

    for event in &mut view.events {
        event.user_info = ledger
            .items
            .iter()
            .find(|item| {
                item.target_type == TargetType::Event
                    && item.target_id == event.id
                    && item.parent_id.as_deref() == Some(view.id.as_str())
            })
            .map(|item| UserInfo::new(ledger.user_id.clone(), item.number_of_participants));
    }
    view
}

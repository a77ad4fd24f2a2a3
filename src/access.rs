//! Who may do what with a document.
//!
//! Owners can do everything. Editors can read and write content. A share code
//! grants read access to whoever presents it, with no identity attached.

use uuid::Uuid;

use crate::error::AppError;
use crate::models::Document;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
    Rename,
    MintShareCode,
    GrantEditAccess,
    Delete,
}

impl Action {
    fn denied_message(self) -> &'static str {
        match self {
            Action::Read => "Not authorized to view this file",
            Action::Write => "Not authorized to edit this file",
            Action::Rename => "Only the owner can rename this file",
            Action::MintShareCode => "Only the owner can create a share code",
            Action::GrantEditAccess => "Only the owner can grant edit access",
            Action::Delete => "Only the owner can delete this file",
        }
    }
}

pub fn is_owner(doc: &Document, user: Uuid) -> bool {
    doc.owner == user
}

pub fn is_editor(doc: &Document, user: Uuid) -> bool {
    doc.editor_ids.contains(&user)
}

pub fn can_read(doc: &Document, user: Option<Uuid>, share_code: Option<&str>) -> bool {
    let by_identity = user.is_some_and(|user| is_owner(doc, user) || is_editor(doc, user));
    let by_code = matches!(
        (share_code, doc.share_code.as_deref()),
        (Some(presented), Some(current)) if presented == current
    );
    by_identity || by_code
}

/// Share codes never grant write access.
pub fn can_write(doc: &Document, user: Uuid) -> bool {
    is_owner(doc, user) || is_editor(doc, user)
}

pub fn can_rename(doc: &Document, user: Uuid) -> bool {
    is_owner(doc, user)
}

pub fn can_mint_share_code(doc: &Document, user: Uuid) -> bool {
    is_owner(doc, user)
}

pub fn can_grant_edit_access(doc: &Document, user: Uuid) -> bool {
    is_owner(doc, user)
}

pub fn can_delete(doc: &Document, user: Uuid) -> bool {
    is_owner(doc, user)
}

pub fn is_allowed(doc: &Document, user: Uuid, action: Action) -> bool {
    match action {
        Action::Read => can_read(doc, Some(user), None),
        Action::Write => can_write(doc, user),
        Action::Rename => can_rename(doc, user),
        Action::MintShareCode => can_mint_share_code(doc, user),
        Action::GrantEditAccess => can_grant_edit_access(doc, user),
        Action::Delete => can_delete(doc, user),
    }
}

/// Gate for authenticated operations on a document that is known to exist.
pub fn require(doc: &Document, user: Uuid, action: Action) -> Result<(), AppError> {
    if is_allowed(doc, user, action) {
        Ok(())
    } else {
        tracing::info!(document_id = %doc.id, user_id = %user, ?action, "access denied");
        Err(AppError::Forbidden(action.denied_message().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const ACTIONS: [Action; 6] = [
        Action::Read,
        Action::Write,
        Action::Rename,
        Action::MintShareCode,
        Action::GrantEditAccess,
        Action::Delete,
    ];

    fn document(owner: Uuid, editors: Vec<Uuid>, share_code: Option<&str>) -> Document {
        let now = Utc::now();
        Document {
            id: Uuid::new_v4(),
            name: "untitled".to_string(),
            owner,
            parent_folder: None,
            content: String::new(),
            share_code: share_code.map(str::to_string),
            editor_ids: editors,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn owner_may_do_everything() {
        let owner = Uuid::new_v4();
        let doc = document(owner, vec![], None);
        for action in ACTIONS {
            assert!(is_allowed(&doc, owner, action), "{action:?}");
        }
    }

    #[test]
    fn editor_may_only_read_and_write() {
        let owner = Uuid::new_v4();
        let editor = Uuid::new_v4();
        let doc = document(owner, vec![editor], None);

        for action in ACTIONS {
            let expected = matches!(action, Action::Read | Action::Write);
            assert_eq!(is_allowed(&doc, editor, action), expected, "{action:?}");
        }
    }

    #[test]
    fn stranger_may_do_nothing() {
        let doc = document(Uuid::new_v4(), vec![Uuid::new_v4()], Some("abc123"));
        let stranger = Uuid::new_v4();
        for action in ACTIONS {
            assert!(!is_allowed(&doc, stranger, action), "{action:?}");
        }
    }

    #[test]
    fn write_iff_owner_or_editor() {
        let owner = Uuid::new_v4();
        let editors: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let doc = document(owner, editors.clone(), Some("abc123"));

        assert!(can_write(&doc, owner));
        for editor in &editors {
            assert!(can_write(&doc, *editor));
        }
        for _ in 0..10 {
            let other = Uuid::new_v4();
            assert_eq!(can_write(&doc, other), other == owner || editors.contains(&other));
        }
    }

    #[test]
    fn share_code_reads_without_identity_but_never_writes() {
        let doc = document(Uuid::new_v4(), vec![], Some("abc123"));
        let holder = Uuid::new_v4();

        assert!(can_read(&doc, None, Some("abc123")));
        assert!(can_read(&doc, Some(holder), Some("abc123")));
        assert!(!can_write(&doc, holder));
        assert!(!can_read(&doc, None, Some("abc12")));
        assert!(!can_read(&doc, None, None));
    }

    #[test]
    fn no_code_on_document_matches_nothing() {
        let doc = document(Uuid::new_v4(), vec![], None);
        assert!(!can_read(&doc, None, Some("")));
    }

    #[test]
    fn require_maps_denial_to_forbidden() {
        let doc = document(Uuid::new_v4(), vec![], None);
        let err = require(&doc, Uuid::new_v4(), Action::Delete).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}

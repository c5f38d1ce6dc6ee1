//! Tree nodes and their handles.

// ============================================================================
// Item Kind
// ============================================================================

/// Closed set of node kinds. Dispatch is by exhaustive matching; adding a
/// kind forces every operation to decide how to treat it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// The single tree root sentinel. Not tied to any account.
    Root,
    /// One account's subtree root; the transaction boundary for
    /// account-scoped storage operations.
    ServiceRoot,
    Category,
    Feed,
    /// Recycle bin of one account.
    Bin,
}

impl ItemKind {
    /// Single-character tag used in identity paths.
    pub(crate) fn tag(self) -> char {
        match self {
            ItemKind::Root => 'r',
            ItemKind::ServiceRoot => 's',
            ItemKind::Category => 'c',
            ItemKind::Feed => 'f',
            ItemKind::Bin => 'b',
        }
    }

    /// Whether items of this kind may own children.
    pub(crate) fn allows_children(self) -> bool {
        match self {
            ItemKind::Root | ItemKind::ServiceRoot | ItemKind::Category => true,
            ItemKind::Feed | ItemKind::Bin => false,
        }
    }
}

// ============================================================================
// Item Id
// ============================================================================

/// Generational handle into the model's arena.
///
/// A freed slot bumps its generation, so a handle held across a removal
/// resolves to a `Lookup` error instead of silently pointing at a
/// different item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl ItemId {
    /// The undefined index. Lookup resolves it to the Root sentinel.
    pub const UNDEFINED: ItemId = ItemId {
        slot: u32::MAX,
        generation: 0,
    };
}

// ============================================================================
// Item
// ============================================================================

/// One node of the feed tree.
#[derive(Debug)]
pub struct Item {
    pub kind: ItemKind,
    /// Storage row ID; unique within the account scope. 0 for the Root.
    pub storage_id: i64,
    /// Owning account. 0 for the Root.
    pub account_id: i64,
    pub title: String,
    /// Unread messages in this item's subtree (aggregated for containers).
    pub unread: i64,
    /// Undeleted messages in this item's subtree.
    pub total: i64,
    pub(crate) index: ItemId,
    pub(crate) parent: Option<ItemId>,
    pub(crate) children: Vec<ItemId>,
}

impl Item {
    /// This item's handle in the model.
    pub fn index(&self) -> ItemId {
        self.index
    }

    /// Parent handle; `None` only for the Root.
    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    /// Ordered child handles.
    pub fn children(&self) -> &[ItemId] {
        &self.children
    }
}

//! # Blocks
//!
//! Value types for the document tree as it travels across boundaries
//! (clipboard, persistence, snapshots printed by the CLI). The live tree is
//! the arena in [`crate::tree`]; [`Block`] is its nested, serializable form.
//!
//! Block payloads are a tagged union keyed by `type`, so each variant only
//! carries the fields it uses:
//!
//! ```json
//! { "id": "k3-1", "type": "image", "imageUrl": "/cat.png", "blocks": [] }
//! ```

use crate::id_generator::BlockId;
use crate::styles::Styles;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Variant payload of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum BlockKind {
    H1 {
        #[serde(default)]
        content: String,
    },
    H2 {
        #[serde(default)]
        content: String,
    },
    H3 {
        #[serde(default)]
        content: String,
    },
    H4 {
        #[serde(default)]
        content: String,
    },
    H5 {
        #[serde(default)]
        content: String,
    },
    H6 {
        #[serde(default)]
        content: String,
    },
    Text {
        #[serde(default)]
        content: String,
    },
    /// Rich text; `content` holds markup
    Paragraph {
        #[serde(default)]
        content: String,
    },
    Image {
        #[serde(default)]
        image_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
    Button {
        #[serde(default)]
        content: String,
        #[serde(default)]
        button_type: ButtonType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        form_id: Option<String>,
    },
    Divider,
    Container,
    Quote {
        #[serde(default)]
        content: String,
    },
    Code {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Video {
        #[serde(default)]
        video_url: String,
    },
    Form {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        form_id: Option<String>,
    },
}

/// What a button does when clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonType {
    #[default]
    Link,
    Submit,
}

/// The closed set of block type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Text,
    Paragraph,
    Image,
    Button,
    Divider,
    Container,
    Quote,
    Code,
    Video,
    Form,
}

impl BlockType {
    pub const ALL: [BlockType; 16] = [
        BlockType::H1,
        BlockType::H2,
        BlockType::H3,
        BlockType::H4,
        BlockType::H5,
        BlockType::H6,
        BlockType::Text,
        BlockType::Paragraph,
        BlockType::Image,
        BlockType::Button,
        BlockType::Divider,
        BlockType::Container,
        BlockType::Quote,
        BlockType::Code,
        BlockType::Video,
        BlockType::Form,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::H1 => "h1",
            BlockType::H2 => "h2",
            BlockType::H3 => "h3",
            BlockType::H4 => "h4",
            BlockType::H5 => "h5",
            BlockType::H6 => "h6",
            BlockType::Text => "text",
            BlockType::Paragraph => "paragraph",
            BlockType::Image => "image",
            BlockType::Button => "button",
            BlockType::Divider => "divider",
            BlockType::Container => "container",
            BlockType::Quote => "quote",
            BlockType::Code => "code",
            BlockType::Video => "video",
            BlockType::Form => "form",
        }
    }

    /// Only containers nest new blocks by default
    pub fn is_container(&self) -> bool {
        matches!(self, BlockType::Container)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown block type: {}", s))
    }
}

impl BlockKind {
    /// Empty payload for a block type
    pub fn empty(block_type: BlockType) -> Self {
        let content = String::new();
        match block_type {
            BlockType::H1 => BlockKind::H1 { content },
            BlockType::H2 => BlockKind::H2 { content },
            BlockType::H3 => BlockKind::H3 { content },
            BlockType::H4 => BlockKind::H4 { content },
            BlockType::H5 => BlockKind::H5 { content },
            BlockType::H6 => BlockKind::H6 { content },
            BlockType::Text => BlockKind::Text { content },
            BlockType::Paragraph => BlockKind::Paragraph { content },
            BlockType::Image => BlockKind::Image {
                image_url: String::new(),
                alt: None,
            },
            BlockType::Button => BlockKind::Button {
                content,
                button_type: ButtonType::default(),
                url: None,
                form_id: None,
            },
            BlockType::Divider => BlockKind::Divider,
            BlockType::Container => BlockKind::Container,
            BlockType::Quote => BlockKind::Quote { content },
            BlockType::Code => BlockKind::Code {
                content,
                language: None,
            },
            BlockType::Video => BlockKind::Video {
                video_url: String::new(),
            },
            BlockType::Form => BlockKind::Form { form_id: None },
        }
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            BlockKind::H1 { .. } => BlockType::H1,
            BlockKind::H2 { .. } => BlockType::H2,
            BlockKind::H3 { .. } => BlockType::H3,
            BlockKind::H4 { .. } => BlockType::H4,
            BlockKind::H5 { .. } => BlockType::H5,
            BlockKind::H6 { .. } => BlockType::H6,
            BlockKind::Text { .. } => BlockType::Text,
            BlockKind::Paragraph { .. } => BlockType::Paragraph,
            BlockKind::Image { .. } => BlockType::Image,
            BlockKind::Button { .. } => BlockType::Button,
            BlockKind::Divider => BlockType::Divider,
            BlockKind::Container => BlockType::Container,
            BlockKind::Quote { .. } => BlockType::Quote,
            BlockKind::Code { .. } => BlockType::Code,
            BlockKind::Video { .. } => BlockType::Video,
            BlockKind::Form { .. } => BlockType::Form,
        }
    }

    /// Text payload, for variants that have one
    pub fn content(&self) -> Option<&str> {
        match self {
            BlockKind::H1 { content }
            | BlockKind::H2 { content }
            | BlockKind::H3 { content }
            | BlockKind::H4 { content }
            | BlockKind::H5 { content }
            | BlockKind::H6 { content }
            | BlockKind::Text { content }
            | BlockKind::Paragraph { content }
            | BlockKind::Quote { content }
            | BlockKind::Code { content, .. }
            | BlockKind::Button { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Replace the text payload. Returns false for variants without one.
    pub fn set_content(&mut self, text: impl Into<String>) -> bool {
        match self {
            BlockKind::H1 { content }
            | BlockKind::H2 { content }
            | BlockKind::H3 { content }
            | BlockKind::H4 { content }
            | BlockKind::H5 { content }
            | BlockKind::H6 { content }
            | BlockKind::Text { content }
            | BlockKind::Paragraph { content }
            | BlockKind::Quote { content }
            | BlockKind::Code { content, .. }
            | BlockKind::Button { content, .. } => {
                *content = text.into();
                true
            }
            _ => false,
        }
    }

    pub fn form_id(&self) -> Option<&str> {
        match self {
            BlockKind::Button { form_id, .. } | BlockKind::Form { form_id } => form_id.as_deref(),
            _ => None,
        }
    }

    /// Clear a reference to `form_id`; returns whether one was cleared
    pub fn clear_form_ref(&mut self, form_id: &str) -> bool {
        match self {
            BlockKind::Button { form_id: slot, .. } | BlockKind::Form { form_id: slot } => {
                if slot.as_deref() == Some(form_id) {
                    *slot = None;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}

/// Everything a block owns except its identity and children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockData {
    #[serde(flatten)]
    pub kind: BlockKind,

    #[serde(default, skip_serializing_if = "Styles::is_empty")]
    pub styles: Styles,

    /// Advisory nesting depth used for default styling
    #[serde(default)]
    pub level: u32,

    /// Whether "insert into selection" nests inside this block
    #[serde(default)]
    pub allow_nesting: bool,

    /// Overrides merged into blocks created inside this one
    #[serde(default, skip_serializing_if = "Styles::is_empty")]
    pub children_base_styles: Styles,
}

impl BlockData {
    pub fn new(kind: BlockKind) -> Self {
        let allow_nesting = kind.block_type().is_container();
        Self {
            kind,
            styles: Styles::default(),
            level: 0,
            allow_nesting,
            children_base_styles: Styles::default(),
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.kind.block_type()
    }
}

/// A block with its subtree, in nested form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Empty until the tree stamps one
    #[serde(default)]
    pub id: BlockId,

    #[serde(default)]
    pub parent_id: Option<BlockId>,

    #[serde(flatten)]
    pub data: BlockData,

    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Block {
    /// Unstamped block of the given kind
    pub fn new(kind: BlockKind) -> Self {
        Self {
            id: BlockId::new(),
            parent_id: None,
            data: BlockData::new(kind),
            blocks: Vec::new(),
        }
    }

    pub fn of_type(block_type: BlockType) -> Self {
        Self::new(BlockKind::empty(block_type))
    }

    pub fn with_id(mut self, id: impl Into<BlockId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_styles(mut self, styles: Styles) -> Self {
        self.data.styles = styles;
        self
    }

    pub fn with_children_base_styles(mut self, styles: Styles) -> Self {
        self.data.children_base_styles = styles;
        self
    }

    pub fn with_allow_nesting(mut self, allow_nesting: bool) -> Self {
        self.data.allow_nesting = allow_nesting;
        self
    }

    pub fn with_child(mut self, child: Block) -> Self {
        self.blocks.push(child);
        self
    }

    pub fn block_type(&self) -> BlockType {
        self.data.block_type()
    }

    /// Ids of this block and every descendant, pre-order
    pub fn ids(&self) -> Vec<BlockId> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, out: &mut Vec<BlockId>) {
        out.push(self.id.clone());
        for child in &self.blocks {
            child.collect_ids(out);
        }
    }

    /// Same block with every id (and `parentId`) blanked, for comparing
    /// structure independently of identity
    pub fn without_ids(&self) -> Block {
        Block {
            id: BlockId::new(),
            parent_id: None,
            data: self.data.clone(),
            blocks: self.blocks.iter().map(Block::without_ids).collect(),
        }
    }
}

/// A named set of input fields referenced from `form`/`button` blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormItem {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,

    #[serde(default)]
    pub label: String,

    #[serde(default = "default_field_type")]
    pub field_type: String,

    #[serde(default)]
    pub required: bool,
}

fn default_field_type() -> String {
    "text".to_string()
}

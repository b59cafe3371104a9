use crate::value::Value;

/// The contents of a file or of a block: attributes and nested blocks, in
/// source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<Block>,
}

impl Body {
    /// Blocks of the given type, in source order.
    pub fn blocks_of<'a>(&'a self, ident: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.ident == ident)
    }

    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key == key)
    }
}

/// `key = expression`
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub expr: Expression,
}

/// `ident "label" ... { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub ident: String,
    pub labels: Vec<String>,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// A quoted string containing at least one `${...}` interpolation.
    Template(Vec<TemplatePart>),
    /// A dotted variable path such as `produce.http.a`.
    Traversal(Vec<String>),
    Call { name: String, args: Vec<Expression> },
    Array(Vec<Expression>),
    Object(Vec<(String, Expression)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Interpolation(Expression),
}

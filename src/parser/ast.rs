//! ESTree-shaped syntax tree for the ES5 subset that obfuscated scripts use.
//!
//! Every node kind is a closed enum variant or a plain data struct, so the
//! deobfuscation passes can match exhaustively instead of probing shapes.
//! Nodes own their children; rewriting a tree means substituting subtrees.

#[derive(Debug, Clone, Default)]
pub struct Meta {
    pub start_index: usize,
    pub end_index: usize,
}

impl Meta {
    /// Meta for nodes synthesised by a rewrite rather than read from source.
    pub fn synthetic() -> Self {
        Meta::default()
    }
}

pub trait HasMeta {
    fn get_meta(&self) -> &Meta;
}

#[derive(Debug, Clone)]
pub struct IdentifierData {
    pub name: String,
    pub meta: Meta,
}

impl IdentifierData {
    pub fn new(name: impl Into<String>) -> Self {
        IdentifierData {
            name: name.into(),
            meta: Meta::synthetic(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExpressionType {
    Literal(LiteralData),
    Identifier(IdentifierData),
    ThisExpression {
        meta: Meta,
    },
    ArrayExpression {
        meta: Meta,
        elements: Vec<Option<ExpressionType>>,
    },
    ObjectExpression {
        meta: Meta,
        properties: Vec<PropertyData>,
    },
    FunctionExpression(FunctionData),
    UnaryExpression {
        meta: Meta,
        operator: UnaryOperator,
        argument: Box<ExpressionType>,
    },
    UpdateExpression {
        meta: Meta,
        operator: UpdateOperator,
        argument: Box<ExpressionType>,
        prefix: bool,
    },
    BinaryExpression {
        meta: Meta,
        operator: BinaryOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    AssignmentExpression {
        meta: Meta,
        operator: AssignmentOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    LogicalExpression {
        meta: Meta,
        operator: LogicalOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    ConditionalExpression {
        meta: Meta,
        test: Box<ExpressionType>,
        consequent: Box<ExpressionType>,
        alternate: Box<ExpressionType>,
    },
    CallExpression {
        meta: Meta,
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionType>,
    },
    NewExpression {
        meta: Meta,
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionType>,
    },
    SequenceExpression {
        meta: Meta,
        expressions: Vec<ExpressionType>,
    },
    MemberExpression(MemberExpressionType),
    /// Scaffolding left behind while an asynchronous rewrite is in flight.
    /// `index` points into the rewrite's pending results; `original` is the
    /// node that goes back in if the result never arrives.
    PendingRewrite {
        index: usize,
        original: Box<ExpressionType>,
    },
}

impl HasMeta for ExpressionType {
    fn get_meta(&self) -> &Meta {
        match self {
            ExpressionType::Literal(data) => &data.meta,
            ExpressionType::Identifier(data) => &data.meta,
            ExpressionType::ThisExpression { meta } => meta,
            ExpressionType::ArrayExpression { meta, .. } => meta,
            ExpressionType::ObjectExpression { meta, .. } => meta,
            ExpressionType::FunctionExpression(data) => &data.meta,
            ExpressionType::UnaryExpression { meta, .. } => meta,
            ExpressionType::UpdateExpression { meta, .. } => meta,
            ExpressionType::BinaryExpression { meta, .. } => meta,
            ExpressionType::AssignmentExpression { meta, .. } => meta,
            ExpressionType::LogicalExpression { meta, .. } => meta,
            ExpressionType::ConditionalExpression { meta, .. } => meta,
            ExpressionType::CallExpression { meta, .. } => meta,
            ExpressionType::NewExpression { meta, .. } => meta,
            ExpressionType::SequenceExpression { meta, .. } => meta,
            ExpressionType::MemberExpression(data) => data.get_meta(),
            ExpressionType::PendingRewrite { original, .. } => original.get_meta(),
        }
    }
}

impl ExpressionType {
    pub fn new_literal(value: LiteralType) -> Self {
        ExpressionType::Literal(LiteralData {
            meta: Meta::synthetic(),
            value,
        })
    }

    pub fn new_identifier(name: impl Into<String>) -> Self {
        ExpressionType::Identifier(IdentifierData::new(name))
    }

    pub fn as_literal(&self) -> Option<&LiteralType> {
        match self {
            ExpressionType::Literal(data) => Some(&data.value),
            _ => None,
        }
    }

    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            ExpressionType::Literal(LiteralData {
                value: LiteralType::StringLiteral(s),
                ..
            }) => Some(s),
            _ => None,
        }
    }

    pub fn is_identifier_named(&self, name: &str) -> bool {
        matches!(self, ExpressionType::Identifier(id) if id.name == name)
    }
}

#[derive(Debug, Clone)]
pub enum MemberExpressionType {
    SimpleMemberExpression {
        meta: Meta,
        object: Box<ExpressionType>,
        property: IdentifierData,
    },
    ComputedMemberExpression {
        meta: Meta,
        object: Box<ExpressionType>,
        property: Box<ExpressionType>,
    },
}

impl HasMeta for MemberExpressionType {
    fn get_meta(&self) -> &Meta {
        match self {
            MemberExpressionType::SimpleMemberExpression { meta, .. } => meta,
            MemberExpressionType::ComputedMemberExpression { meta, .. } => meta,
        }
    }
}

impl MemberExpressionType {
    pub fn object(&self) -> &ExpressionType {
        match self {
            MemberExpressionType::SimpleMemberExpression { object, .. } => object,
            MemberExpressionType::ComputedMemberExpression { object, .. } => object,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, MemberExpressionType::ComputedMemberExpression { .. })
    }
}

#[derive(Debug, Clone)]
pub struct PropertyData {
    pub meta: Meta,
    pub key: PropertyKey,
    pub value: ExpressionType,
    pub kind: PropertyKind,
}

#[derive(Debug, Clone)]
pub enum PropertyKey {
    Identifier(IdentifierData),
    Literal(LiteralData),
    Computed(Box<ExpressionType>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyKind {
    Init,
    Get,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssignmentOperator {
    Equals,
    AddEquals,
    SubtractEquals,
    MultiplyEquals,
    DivideEquals,
    ModuloEquals,
    BitwiseLeftShiftEquals,
    BitwiseRightShiftEquals,
    BitwiseUnsignedRightShiftEquals,
    BitwiseOrEquals,
    BitwiseAndEquals,
    BitwiseXorEquals,
}

impl AssignmentOperator {
    pub fn from_str(op: &str) -> Option<Self> {
        Some(match op {
            "=" => AssignmentOperator::Equals,
            "+=" => AssignmentOperator::AddEquals,
            "-=" => AssignmentOperator::SubtractEquals,
            "*=" => AssignmentOperator::MultiplyEquals,
            "/=" => AssignmentOperator::DivideEquals,
            "%=" => AssignmentOperator::ModuloEquals,
            "<<=" => AssignmentOperator::BitwiseLeftShiftEquals,
            ">>=" => AssignmentOperator::BitwiseRightShiftEquals,
            ">>>=" => AssignmentOperator::BitwiseUnsignedRightShiftEquals,
            "|=" => AssignmentOperator::BitwiseOrEquals,
            "&=" => AssignmentOperator::BitwiseAndEquals,
            "^=" => AssignmentOperator::BitwiseXorEquals,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentOperator::Equals => "=",
            AssignmentOperator::AddEquals => "+=",
            AssignmentOperator::SubtractEquals => "-=",
            AssignmentOperator::MultiplyEquals => "*=",
            AssignmentOperator::DivideEquals => "/=",
            AssignmentOperator::ModuloEquals => "%=",
            AssignmentOperator::BitwiseLeftShiftEquals => "<<=",
            AssignmentOperator::BitwiseRightShiftEquals => ">>=",
            AssignmentOperator::BitwiseUnsignedRightShiftEquals => ">>>=",
            AssignmentOperator::BitwiseOrEquals => "|=",
            AssignmentOperator::BitwiseAndEquals => "&=",
            AssignmentOperator::BitwiseXorEquals => "^=",
        }
    }

    /// The binary operator a compound assignment applies, `None` for `=`.
    pub fn binary_operator(&self) -> Option<BinaryOperator> {
        Some(match self {
            AssignmentOperator::Equals => return None,
            AssignmentOperator::AddEquals => BinaryOperator::Add,
            AssignmentOperator::SubtractEquals => BinaryOperator::Subtract,
            AssignmentOperator::MultiplyEquals => BinaryOperator::Multiply,
            AssignmentOperator::DivideEquals => BinaryOperator::Divide,
            AssignmentOperator::ModuloEquals => BinaryOperator::Modulo,
            AssignmentOperator::BitwiseLeftShiftEquals => BinaryOperator::BitwiseLeftShift,
            AssignmentOperator::BitwiseRightShiftEquals => BinaryOperator::BitwiseRightShift,
            AssignmentOperator::BitwiseUnsignedRightShiftEquals => {
                BinaryOperator::BitwiseUnsignedRightShift
            }
            AssignmentOperator::BitwiseOrEquals => BinaryOperator::BitwiseOr,
            AssignmentOperator::BitwiseAndEquals => BinaryOperator::BitwiseAnd,
            AssignmentOperator::BitwiseXorEquals => BinaryOperator::BitwiseXor,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    LogicalNot,
    BitwiseNot,
    TypeOf,
    Void,
    Delete,
}

impl UnaryOperator {
    pub fn from_str(op: &str) -> Option<Self> {
        Some(match op {
            "-" => UnaryOperator::Minus,
            "+" => UnaryOperator::Plus,
            "!" => UnaryOperator::LogicalNot,
            "~" => UnaryOperator::BitwiseNot,
            "typeof" => UnaryOperator::TypeOf,
            "void" => UnaryOperator::Void,
            "delete" => UnaryOperator::Delete,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::LogicalNot => "!",
            UnaryOperator::BitwiseNot => "~",
            UnaryOperator::TypeOf => "typeof",
            UnaryOperator::Void => "void",
            UnaryOperator::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOperator {
    PlusPlus,
    MinusMinus,
}

impl UpdateOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOperator::PlusPlus => "++",
            UpdateOperator::MinusMinus => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    LooselyEqual,
    LooselyUnequal,
    StrictlyEqual,
    StrictlyUnequal,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    BitwiseLeftShift,
    BitwiseRightShift,
    BitwiseUnsignedRightShift,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitwiseOr,
    BitwiseAnd,
    BitwiseXor,
    In,
    InstanceOf,
}

impl BinaryOperator {
    pub fn from_str(op: &str) -> Option<Self> {
        Some(match op {
            "==" => BinaryOperator::LooselyEqual,
            "!=" => BinaryOperator::LooselyUnequal,
            "===" => BinaryOperator::StrictlyEqual,
            "!==" => BinaryOperator::StrictlyUnequal,
            "<" => BinaryOperator::LessThan,
            "<=" => BinaryOperator::LessThanEqual,
            ">" => BinaryOperator::GreaterThan,
            ">=" => BinaryOperator::GreaterThanEqual,
            "<<" => BinaryOperator::BitwiseLeftShift,
            ">>" => BinaryOperator::BitwiseRightShift,
            ">>>" => BinaryOperator::BitwiseUnsignedRightShift,
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Subtract,
            "*" => BinaryOperator::Multiply,
            "/" => BinaryOperator::Divide,
            "%" => BinaryOperator::Modulo,
            "|" => BinaryOperator::BitwiseOr,
            "&" => BinaryOperator::BitwiseAnd,
            "^" => BinaryOperator::BitwiseXor,
            "in" => BinaryOperator::In,
            "instanceof" => BinaryOperator::InstanceOf,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::LooselyEqual => "==",
            BinaryOperator::LooselyUnequal => "!=",
            BinaryOperator::StrictlyEqual => "===",
            BinaryOperator::StrictlyUnequal => "!==",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEqual => ">=",
            BinaryOperator::BitwiseLeftShift => "<<",
            BinaryOperator::BitwiseRightShift => ">>",
            BinaryOperator::BitwiseUnsignedRightShift => ">>>",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::BitwiseOr => "|",
            BinaryOperator::BitwiseAnd => "&",
            BinaryOperator::BitwiseXor => "^",
            BinaryOperator::In => "in",
            BinaryOperator::InstanceOf => "instanceof",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicalOperator {
    Or,
    And,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::Or => "||",
            LogicalOperator::And => "&&",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiteralData {
    pub meta: Meta,
    pub value: LiteralType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralType {
    StringLiteral(String),
    BooleanLiteral(bool),
    NullLiteral,
    NumberLiteral(NumberLiteralType),
    RegExpLiteral(RegExpLiteralData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegExpLiteralData {
    pub pattern: String,
    pub flags: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumberLiteralType {
    IntegerLiteral(i64),
    FloatLiteral(f64),
}

impl NumberLiteralType {
    pub fn as_f64(&self) -> f64 {
        match self {
            NumberLiteralType::IntegerLiteral(i) => *i as f64,
            NumberLiteralType::FloatLiteral(f) => *f,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgramData {
    pub meta: Meta,
    pub body: Vec<StatementType>,
}

impl HasMeta for ProgramData {
    fn get_meta(&self) -> &Meta {
        &self.meta
    }
}

#[derive(Debug, Clone)]
pub struct BlockStatementData {
    pub meta: Meta,
    pub body: Vec<StatementType>,
}

#[derive(Debug, Clone)]
pub enum StatementType {
    ExpressionStatement {
        meta: Meta,
        expression: ExpressionType,
    },
    BlockStatement(BlockStatementData),
    EmptyStatement {
        meta: Meta,
    },
    DebuggerStatement {
        meta: Meta,
    },
    WithStatement {
        meta: Meta,
        object: ExpressionType,
        body: Box<StatementType>,
    },
    ReturnStatement {
        meta: Meta,
        argument: Option<ExpressionType>,
    },
    LabeledStatement {
        meta: Meta,
        label: IdentifierData,
        body: Box<StatementType>,
    },
    BreakStatement {
        meta: Meta,
        label: Option<IdentifierData>,
    },
    ContinueStatement {
        meta: Meta,
        label: Option<IdentifierData>,
    },
    IfStatement {
        meta: Meta,
        test: ExpressionType,
        consequent: Box<StatementType>,
        alternate: Option<Box<StatementType>>,
    },
    SwitchStatement {
        meta: Meta,
        discriminant: ExpressionType,
        cases: Vec<SwitchCaseData>,
    },
    ThrowStatement {
        meta: Meta,
        argument: ExpressionType,
    },
    TryStatement {
        meta: Meta,
        block: BlockStatementData,
        handler: Option<CatchClauseData>,
        finalizer: Option<BlockStatementData>,
    },
    WhileStatement {
        meta: Meta,
        test: ExpressionType,
        body: Box<StatementType>,
    },
    DoWhileStatement {
        meta: Meta,
        body: Box<StatementType>,
        test: ExpressionType,
    },
    ForStatement {
        meta: Meta,
        init: Option<VariableDeclarationOrExpression>,
        test: Option<ExpressionType>,
        update: Option<ExpressionType>,
        body: Box<StatementType>,
    },
    ForInStatement {
        meta: Meta,
        left: VariableDeclarationOrExpression,
        right: ExpressionType,
        body: Box<StatementType>,
    },
    DeclarationStatement(DeclarationType),
}

impl HasMeta for StatementType {
    fn get_meta(&self) -> &Meta {
        match self {
            StatementType::ExpressionStatement { meta, .. } => meta,
            StatementType::BlockStatement(data) => &data.meta,
            StatementType::EmptyStatement { meta } => meta,
            StatementType::DebuggerStatement { meta } => meta,
            StatementType::WithStatement { meta, .. } => meta,
            StatementType::ReturnStatement { meta, .. } => meta,
            StatementType::LabeledStatement { meta, .. } => meta,
            StatementType::BreakStatement { meta, .. } => meta,
            StatementType::ContinueStatement { meta, .. } => meta,
            StatementType::IfStatement { meta, .. } => meta,
            StatementType::SwitchStatement { meta, .. } => meta,
            StatementType::ThrowStatement { meta, .. } => meta,
            StatementType::TryStatement { meta, .. } => meta,
            StatementType::WhileStatement { meta, .. } => meta,
            StatementType::DoWhileStatement { meta, .. } => meta,
            StatementType::ForStatement { meta, .. } => meta,
            StatementType::ForInStatement { meta, .. } => meta,
            StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(data)) => {
                &data.meta
            }
            StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(data)) => {
                &data.meta
            }
        }
    }
}

impl StatementType {
    pub fn empty() -> Self {
        StatementType::EmptyStatement {
            meta: Meta::synthetic(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchCaseData {
    pub meta: Meta,
    /// `None` for the `default:` clause.
    pub test: Option<ExpressionType>,
    pub consequent: Vec<StatementType>,
}

#[derive(Debug, Clone)]
pub struct CatchClauseData {
    pub meta: Meta,
    pub param: IdentifierData,
    pub body: BlockStatementData,
}

#[derive(Debug, Clone)]
pub enum VariableDeclarationOrExpression {
    VariableDeclaration(VariableDeclarationData),
    Expression(ExpressionType),
}

#[derive(Debug, Clone)]
pub enum DeclarationType {
    FunctionDeclaration(FunctionData),
    VariableDeclaration(VariableDeclarationData),
}

#[derive(Debug, Clone)]
pub struct VariableDeclarationData {
    pub meta: Meta,
    pub declarations: Vec<VariableDeclaratorData>,
    pub kind: VariableDeclarationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableDeclarationKind {
    Var,
    Let,
    Const,
}

impl VariableDeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableDeclarationKind::Var => "var",
            VariableDeclarationKind::Let => "let",
            VariableDeclarationKind::Const => "const",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableDeclaratorData {
    pub meta: Meta,
    pub id: IdentifierData,
    pub init: Option<ExpressionType>,
}

#[derive(Debug, Clone)]
pub struct FunctionData {
    pub meta: Meta,
    pub id: Option<IdentifierData>,
    pub params: Vec<IdentifierData>,
    pub body: FunctionBodyData,
}

#[derive(Debug, Clone)]
pub struct FunctionBodyData {
    pub meta: Meta,
    pub body: Vec<StatementType>,
}

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable {
    pub name: String,
    pub from_compiler: bool
}

impl Variable {
    pub fn new(name: &str) -> Variable {
        Variable {
            name: name.to_owned(),
            from_compiler: false
        }
    }

    /// A variable introduced by the compiler. Never equal to a user variable of the same name.
    pub fn compiler(name: &str) -> Variable {
        Variable {
            name: name.to_owned(),
            from_compiler: true
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from_compiler {
            write!(f, "%{}", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Char(u8)
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{}", value),
            Literal::Bool(value) => write!(f, "{}", value),
            Literal::Char(value) => write!(f, "'{}'", *value as char)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    And,
    Or
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||"
        }
    }

    pub fn is_short_circuit(&self) -> bool {
        match self {
            BinaryOperator::And | BinaryOperator::Or => true,
            _ => false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    ArrayLength,
    Negative,
    Not
}

impl UnaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::ArrayLength => "@",
            UnaryOperator::Negative => "-",
            UnaryOperator::Not => "!"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Scalar(Variable),
    Array(Variable, Box<NativeExpression>)
}

impl Location {
    pub fn scalar(name: &str) -> Location {
        Location::Scalar(Variable::new(name))
    }

    pub fn array(name: &str, index: NativeExpression) -> Location {
        Location::Array(Variable::new(name), Box::new(index))
    }

    pub fn variable(&self) -> &Variable {
        match self {
            Location::Scalar(variable) => variable,
            Location::Array(variable, _) => variable
        }
    }

    pub fn is_scalar(&self) -> bool {
        match self {
            Location::Scalar(_) => true,
            Location::Array(..) => false
        }
    }

    pub fn index(&self) -> Option<&NativeExpression> {
        match self {
            Location::Scalar(_) => None,
            Location::Array(_, index) => Some(&**index)
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Scalar(variable) => write!(f, "{}", variable),
            Location::Array(variable, index) => write!(f, "{}[{}]", variable, index)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringLiteralId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallArgument {
    Expression(NativeExpression),
    StringLiteral(StringLiteralId)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodCall {
    pub name: String,
    pub arguments: Vec<CallArgument>
}

impl MethodCall {
    pub fn new(name: &str, arguments: Vec<CallArgument>) -> MethodCall {
        MethodCall {
            name: name.to_owned(),
            arguments
        }
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (index, argument) in self.arguments.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }

            match argument {
                CallArgument::Expression(expression) => write!(f, "{}", expression)?,
                CallArgument::StringLiteral(id) => write!(f, "str{}", id.0)?
            }
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeExpression {
    Literal(Literal),
    Location(Location),
    Binary { operator: BinaryOperator, left: Box<NativeExpression>, right: Box<NativeExpression> },
    Unary { operator: UnaryOperator, operand: Box<NativeExpression> },
    Ternary { condition: Box<NativeExpression>, true_value: Box<NativeExpression>, false_value: Box<NativeExpression> },
    Call(MethodCall)
}

impl NativeExpression {
    pub fn int(value: i64) -> NativeExpression {
        NativeExpression::Literal(Literal::Int(value))
    }

    pub fn boolean(value: bool) -> NativeExpression {
        NativeExpression::Literal(Literal::Bool(value))
    }

    pub fn scalar(name: &str) -> NativeExpression {
        NativeExpression::Location(Location::scalar(name))
    }

    pub fn variable(variable: &Variable) -> NativeExpression {
        NativeExpression::Location(Location::Scalar(variable.clone()))
    }

    pub fn binary(operator: BinaryOperator, left: NativeExpression, right: NativeExpression) -> NativeExpression {
        NativeExpression::Binary { operator, left: Box::new(left), right: Box::new(right) }
    }

    pub fn unary(operator: UnaryOperator, operand: NativeExpression) -> NativeExpression {
        NativeExpression::Unary { operator, operand: Box::new(operand) }
    }

    pub fn ternary(condition: NativeExpression,
                   true_value: NativeExpression,
                   false_value: NativeExpression) -> NativeExpression {
        NativeExpression::Ternary {
            condition: Box::new(condition),
            true_value: Box::new(true_value),
            false_value: Box::new(false_value)
        }
    }

    pub fn call(name: &str, arguments: Vec<NativeExpression>) -> NativeExpression {
        NativeExpression::Call(MethodCall::new(
            name,
            arguments.into_iter().map(CallArgument::Expression).collect()
        ))
    }

    /// The direct operands, in evaluation order. String literal arguments are not expressions.
    pub fn children(&self) -> Vec<&NativeExpression> {
        match self {
            NativeExpression::Literal(_) => Vec::new(),
            NativeExpression::Location(Location::Scalar(_)) => Vec::new(),
            NativeExpression::Location(Location::Array(_, index)) => vec![&**index],
            NativeExpression::Binary { left, right, .. } => vec![&**left, &**right],
            NativeExpression::Unary { operand, .. } => vec![&**operand],
            NativeExpression::Ternary { condition, true_value, false_value } => {
                vec![&**condition, &**true_value, &**false_value]
            }
            NativeExpression::Call(call) => {
                call.arguments
                    .iter()
                    .filter_map(|argument| match argument {
                        CallArgument::Expression(expression) => Some(expression),
                        CallArgument::StringLiteral(_) => None
                    })
                    .collect()
            }
        }
    }

    /// Rebuilds the expression with `f` applied to each direct operand.
    pub fn map_children<F: FnMut(&NativeExpression) -> NativeExpression>(&self, mut f: F) -> NativeExpression {
        match self {
            NativeExpression::Literal(_) | NativeExpression::Location(Location::Scalar(_)) => self.clone(),
            NativeExpression::Location(Location::Array(variable, index)) => {
                NativeExpression::Location(Location::Array(variable.clone(), Box::new(f(&**index))))
            }
            NativeExpression::Binary { operator, left, right } => {
                let left = f(&**left);
                let right = f(&**right);
                NativeExpression::binary(*operator, left, right)
            }
            NativeExpression::Unary { operator, operand } => NativeExpression::unary(*operator, f(&**operand)),
            NativeExpression::Ternary { condition, true_value, false_value } => {
                let condition = f(&**condition);
                let true_value = f(&**true_value);
                let false_value = f(&**false_value);
                NativeExpression::ternary(condition, true_value, false_value)
            }
            NativeExpression::Call(call) => {
                let arguments = call.arguments
                    .iter()
                    .map(|argument| match argument {
                        CallArgument::Expression(expression) => CallArgument::Expression(f(expression)),
                        CallArgument::StringLiteral(id) => CallArgument::StringLiteral(*id)
                    })
                    .collect();

                NativeExpression::Call(MethodCall { name: call.name.clone(), arguments })
            }
        }
    }

    /// Replaces the direct operand at `index` (as ordered by [`NativeExpression::children`]).
    pub fn with_child_replaced(&self, index: usize, replacement: &NativeExpression) -> NativeExpression {
        let num_children = self.children().len();
        if index >= num_children {
            panic!("child {} does not exist in '{}' ({} children)", index, self, num_children);
        }

        let mut current = 0;
        self.map_children(|child| {
            let result = if current == index { replacement.clone() } else { child.clone() };
            current += 1;
            result
        })
    }

    /// Replaces every read of `location`, including reads nested in array indices.
    pub fn with_location_replaced(&self, location: &Location, replacement: &NativeExpression) -> NativeExpression {
        match self {
            NativeExpression::Location(current) if current == location => replacement.clone(),
            _ => self.map_children(|child| child.with_location_replaced(location, replacement))
        }
    }

    pub fn contains_method_call(&self) -> bool {
        match self {
            NativeExpression::Call(_) => true,
            _ => self.children().iter().any(|child| child.contains_method_call())
        }
    }

    /// Literals and scalar reads.
    pub fn is_leaf(&self) -> bool {
        match self {
            NativeExpression::Literal(_) | NativeExpression::Location(Location::Scalar(_)) => true,
            _ => false
        }
    }

    /// Whether computing the expression costs more than loading a temporary.
    pub fn is_complex_enough(&self) -> bool {
        match self {
            NativeExpression::Binary { .. }
            | NativeExpression::Unary { .. }
            | NativeExpression::Ternary { .. }
            | NativeExpression::Call(_) => true,
            NativeExpression::Literal(_) | NativeExpression::Location(_) => false
        }
    }

    pub fn is_nested(&self) -> bool {
        self.children().iter().any(|child| !child.is_leaf())
    }

    /// Whether operands may be hoisted out of the expression. Short-circuit operators and
    /// ternaries evaluate some operands conditionally, so theirs stay in place.
    pub fn is_expandable(&self) -> bool {
        match self {
            NativeExpression::Binary { operator, .. } if operator.is_short_circuit() => false,
            NativeExpression::Ternary { .. } => false,
            _ => self.is_nested()
        }
    }

    /// Every location read by the expression, outermost first.
    pub fn locations(&self) -> Vec<&Location> {
        let mut locations = Vec::new();
        self.collect_locations(&mut locations);
        locations
    }

    fn collect_locations<'a>(&'a self, locations: &mut Vec<&'a Location>) {
        if let NativeExpression::Location(location) = self {
            locations.push(location);
        }

        for child in self.children() {
            child.collect_locations(locations);
        }
    }

    pub fn literal(&self) -> Option<Literal> {
        match self {
            NativeExpression::Literal(literal) => Some(*literal),
            _ => None
        }
    }
}

fn fmt_operand(f: &mut fmt::Formatter<'_>, operand: &NativeExpression) -> fmt::Result {
    if operand.is_leaf() {
        write!(f, "{}", operand)
    } else {
        write!(f, "({})", operand)
    }
}

impl fmt::Display for NativeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeExpression::Literal(literal) => write!(f, "{}", literal),
            NativeExpression::Location(location) => write!(f, "{}", location),
            NativeExpression::Binary { operator, left, right } => {
                fmt_operand(f, left)?;
                write!(f, " {} ", operator.symbol())?;
                fmt_operand(f, right)
            }
            NativeExpression::Unary { operator, operand } => {
                write!(f, "{}", operator.symbol())?;
                fmt_operand(f, operand)
            }
            NativeExpression::Ternary { condition, true_value, false_value } => {
                fmt_operand(f, condition)?;
                write!(f, " ? ")?;
                fmt_operand(f, true_value)?;
                write!(f, " : ")?;
                fmt_operand(f, false_value)
            }
            NativeExpression::Call(call) => write!(f, "{}", call)
        }
    }
}

#[test]
fn test_compiler_variables_are_distinct1() {
    assert_ne!(Variable::new("t0"), Variable::compiler("t0"));
    assert_eq!("%t0", Variable::compiler("t0").to_string());
}

#[test]
fn test_child_replacement1() {
    let expression = NativeExpression::binary(
        BinaryOperator::Add,
        NativeExpression::scalar("a"),
        NativeExpression::binary(BinaryOperator::Mul, NativeExpression::scalar("b"), NativeExpression::int(2))
    );

    assert!(expression.is_nested());
    assert!(expression.is_expandable());

    let replaced = expression.with_child_replaced(1, &NativeExpression::scalar("t"));
    assert_eq!("a + t", replaced.to_string());
    assert!(!replaced.is_nested());
}

#[test]
fn test_location_replacement1() {
    let expression = NativeExpression::binary(
        BinaryOperator::Add,
        NativeExpression::Location(Location::array("arr", NativeExpression::scalar("x"))),
        NativeExpression::scalar("x")
    );

    let replaced = expression.with_location_replaced(&Location::scalar("x"), &NativeExpression::int(3));
    assert_eq!("arr[3] + 3", replaced.to_string());
}

#[test]
fn test_short_circuit_not_expandable1() {
    let nested = NativeExpression::binary(BinaryOperator::Less, NativeExpression::scalar("a"), NativeExpression::int(1));
    let and = NativeExpression::binary(BinaryOperator::And, nested.clone(), NativeExpression::boolean(true));
    let ternary = NativeExpression::ternary(nested.clone(), NativeExpression::int(1), NativeExpression::int(2));
    let call = NativeExpression::call("f", vec![nested]);

    assert!(and.is_nested());
    assert!(!and.is_expandable());
    assert!(!ternary.is_expandable());
    assert!(call.is_expandable());
    assert!(call.contains_method_call());
}

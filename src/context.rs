use std::collections::HashMap;

use crate::model::{StringLiteralId, Variable};

/// State shared by every procedure of one compilation: the string literals that end up in
/// the data section and the counters behind fresh compiler temporaries.
#[derive(Debug, Clone, Default)]
pub struct CompilationContext {
    string_literals: Vec<String>,
    string_literal_ids: HashMap<String, StringLiteralId>,
    temporaries: HashMap<String, usize>
}

impl CompilationContext {
    pub fn new() -> CompilationContext {
        CompilationContext::default()
    }

    pub fn intern_string(&mut self, text: &str) -> StringLiteralId {
        if let Some(id) = self.string_literal_ids.get(text) {
            return *id;
        }

        let id = StringLiteralId(self.string_literals.len());
        self.string_literals.push(text.to_owned());
        self.string_literal_ids.insert(text.to_owned(), id);
        id
    }

    pub fn string_literal(&self, id: StringLiteralId) -> &str {
        &self.string_literals[id.0]
    }

    pub fn string_literals(&self) -> impl Iterator<Item=(StringLiteralId, &str)> {
        self.string_literals
            .iter()
            .enumerate()
            .map(|(index, text)| (StringLiteralId(index), text.as_str()))
    }

    /// A compiler variable named `{prefix}{n}`, never handed out twice.
    pub fn fresh_temporary(&mut self, prefix: &str) -> Variable {
        let counter = self.temporaries.entry(prefix.to_owned()).or_insert(0);
        let variable = Variable::compiler(&format!("{}{}", prefix, counter));
        *counter += 1;
        variable
    }
}

#[test]
fn test_intern_string1() {
    let mut context = CompilationContext::new();
    let hello = context.intern_string("hello");
    let world = context.intern_string("world");
    assert_eq!(hello, context.intern_string("hello"));
    assert_ne!(hello, world);
    assert_eq!("world", context.string_literal(world));
    assert_eq!(2, context.string_literals().count());
}

#[test]
fn test_fresh_temporary1() {
    let mut context = CompilationContext::new();
    assert_eq!(Variable::compiler("cse_temp0"), context.fresh_temporary("cse_temp"));
    assert_eq!(Variable::compiler("cse_temp1"), context.fresh_temporary("cse_temp"));
    assert_eq!(Variable::compiler("see_temp0"), context.fresh_temporary("see_temp"));
}

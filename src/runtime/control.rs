//! WebAssembly label stack for control flow
//!
//! Every active `block`, `loop` and `if` owns a label. A label records how many
//! values a branch to it carries, how tall the operand stack was when the
//! construct was entered and where execution continues afterwards, which is
//! everything `br` needs to unwind.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelType {
    /// Branches continue after the block
    Block,
    /// Branches jump back to the start of the loop
    Loop,
    /// Behaves like a block once a branch has been chosen
    If,
    /// The implicit label around a function body
    Function,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub label_type: LabelType,
    /// Number of values a branch to this label carries
    pub arity: usize,
    /// Height of the operand stack when the label was pushed
    pub stack_height: usize,
    /// Position a branch to this label resumes at
    pub continuation: usize,
}

impl Label {
    pub fn new(label_type: LabelType, arity: usize, stack_height: usize, continuation: usize) -> Label {
        // a loop's label takes the loop's parameters, of which the MVP has none
        let arity = match label_type {
            LabelType::Loop => 0,
            _ => arity,
        };
        Label {
            label_type,
            arity,
            stack_height,
            continuation,
        }
    }
}

#[derive(Debug, Default)]
pub struct LabelStack {
    labels: Vec<Label>,
}

impl LabelStack {
    pub fn new() -> Self {
        LabelStack { labels: Vec::new() }
    }

    pub fn push(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn pop(&mut self) -> Option<Label> {
        self.labels.pop()
    }

    /// The `depth`th label counting from the innermost, which is 0
    pub fn get(&self, depth: u32) -> Option<&Label> {
        let len = self.labels.len();
        if depth as usize >= len {
            return None;
        }
        self.labels.get(len - 1 - depth as usize)
    }

    /// Remove every label up to and including the `depth`th and return it
    pub fn branch_to(&mut self, depth: u32) -> Option<Label> {
        let target = self.get(depth)?.clone();
        self.labels.truncate(self.labels.len() - 1 - depth as usize);
        Some(target)
    }

    pub fn depth(&self) -> usize {
        self.labels.len()
    }
}

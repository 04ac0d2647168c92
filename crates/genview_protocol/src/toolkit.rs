//! The fixed UI toolkit generated components may use.

/// Framework, language and styling utility a component is allowed to depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toolkit {
    pub framework: &'static str,
    pub language: &'static str,
    pub styling: &'static str,
}

/// React with TypeScript, styled through Tailwind utility classes.
pub const BASE_TOOLKIT: Toolkit = Toolkit {
    framework: "React",
    language: "TypeScript",
    styling: "Tailwind CSS",
};

impl Toolkit {
    /// Human-readable list used inside prompts, e.g. "React, TypeScript and Tailwind CSS".
    pub fn describe(&self) -> String {
        format!("{}, {} and {}", self.framework, self.language, self.styling)
    }
}

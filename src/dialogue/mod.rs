mod condition;
mod engine;
mod quest;

pub use condition::ConditionEvaluator;
pub use engine::{DialogueEngine, DialogueEvent, DialogueVars, SpokenLine};
pub use quest::{QuestGraph, QuestLink, QuestNode, QuestNodeKind};

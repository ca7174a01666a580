use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::condition::ConditionEvaluator;
use super::quest::{QuestGraph, QuestWalker, WalkStop};
use crate::level::document::Dialogue;

#[derive(Debug, Clone, PartialEq)]
pub struct SpokenLine {
    pub speaker: Option<String>,
    pub text: String,
}

impl SpokenLine {
    pub fn new(speaker: Option<&str>, text: impl Into<String>) -> Self {
        Self { speaker: speaker.map(str::to_string), text: text.into() }
    }
}

/// Player-visible dialogue notifications, drained once per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogueEvent {
    Started { source: String, lines: Vec<SpokenLine> },
    ChoicesPresented { source: String, options: Vec<String> },
    Ended { source: String },
    Reward { item: String, amount: i64 },
    QuestFinished { owner: Option<String>, visited: Vec<u64> },
}

/// Script variables and the inventory shared by every conversation.
#[derive(Debug, Clone, Default)]
pub struct DialogueVars {
    values: BTreeMap<String, Value>,
    inventory: BTreeMap<String, i64>,
}

impl DialogueVars {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn inventory(&self) -> &BTreeMap<String, i64> {
        &self.inventory
    }

    /// Numeric view of a variable, falling back to the inventory count. Missing reads as 0.
    pub fn number(&self, name: &str) -> f64 {
        match self.values.get(name) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::Bool(flag)) => f64::from(u8::from(*flag)),
            Some(Value::String(text)) => text.trim().parse().unwrap_or(0.0),
            Some(_) => 0.0,
            None => self.inventory_count(name) as f64,
        }
    }

    pub fn inventory_count(&self, item: &str) -> i64 {
        self.inventory.get(item).copied().unwrap_or(0)
    }

    pub fn add_item(&mut self, item: &str, amount: i64) {
        let entry = self.inventory.entry(item.to_string()).or_insert(0);
        *entry = entry.saturating_add(amount).max(0);
    }

    pub fn has_items(&self, items: &[String]) -> bool {
        items.iter().all(|item| self.inventory_count(item) > 0)
    }
}

struct QuestRun {
    graph: QuestGraph,
    owner: Option<String>,
    resume: Option<u64>,
    choice_node: Option<u64>,
    visited: Vec<u64>,
}

struct ActiveDialogue {
    source: String,
    lines: Vec<SpokenLine>,
    cursor: usize,
    choices: Vec<String>,
    quest: Option<QuestRun>,
}

/// Plays registered dialogues, inline line sets and quest graphs, one at a time.
pub struct DialogueEngine {
    dialogues: HashMap<String, Dialogue>,
    active: Option<ActiveDialogue>,
    vars: DialogueVars,
    conditions: ConditionEvaluator,
    events: Vec<DialogueEvent>,
}

impl Default for DialogueEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogueEngine {
    pub fn new() -> Self {
        Self {
            dialogues: HashMap::new(),
            active: None,
            vars: DialogueVars::default(),
            conditions: ConditionEvaluator::new(),
            events: Vec::new(),
        }
    }

    pub fn register(&mut self, dialogue: Dialogue) {
        if self.dialogues.insert(dialogue.id.clone(), dialogue).is_some() {
            debug!("dialogue re-registered");
        }
    }

    pub fn clear_registered(&mut self) {
        self.dialogues.clear();
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.dialogues.contains_key(id)
    }

    pub fn vars(&self) -> &DialogueVars {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut DialogueVars {
        &mut self.vars
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn current_line(&self) -> Option<&SpokenLine> {
        self.active.as_ref().and_then(|active| active.lines.get(active.cursor))
    }

    pub fn current_choices(&self) -> &[String] {
        self.active.as_ref().map(|active| active.choices.as_slice()).unwrap_or(&[])
    }

    pub fn drain_events(&mut self) -> Vec<DialogueEvent> {
        self.events.drain(..).collect()
    }

    /// Play a registered dialogue. Unknown ids are logged and ignored.
    pub fn play(&mut self, id: &str) -> bool {
        let Some(dialogue) = self.dialogues.get(id) else {
            warn!(dialogue = id, "dialogue not registered");
            return false;
        };
        let speaker = dialogue.speaker.clone();
        let lines = dialogue.lines.iter().map(|text| SpokenLine::new(speaker.as_deref(), text.clone())).collect();
        self.start_lines(id.to_string(), lines, None)
    }

    pub fn play_lines(&mut self, source: impl Into<String>, speaker: Option<&str>, lines: &[String]) -> bool {
        let lines = lines.iter().map(|text| SpokenLine::new(speaker, text.clone())).collect();
        self.start_lines(source.into(), lines, None)
    }

    /// Begin walking a quest graph from its Start node. Returns whether the graph ran; a graph
    /// can run to completion in this call without leaving a dialogue active. Empty graphs and
    /// graphs without a Start node are a logged no-op.
    pub fn run_quest(&mut self, graph: &QuestGraph, owner: Option<&str>) -> bool {
        if graph.is_empty() {
            warn!(owner, "quest graph has no nodes");
            return false;
        }
        let Some(start) = graph.start_node().map(|node| node.id) else {
            warn!(owner, "quest graph has no Start node");
            return false;
        };
        self.interrupt();
        let mut run =
            QuestRun { graph: graph.clone(), owner: owner.map(str::to_string), resume: None, choice_node: None, visited: Vec::new() };
        let stop = self.walk(&mut run, start);
        let source = run.owner.clone().map_or_else(|| "quest".to_string(), |owner| format!("quest:{owner}"));
        self.continue_quest(source, run, stop);
        true
    }

    /// Move to the next line; at the end of the lines the quest (if any) resumes.
    pub fn advance(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !active.choices.is_empty() {
            return;
        }
        active.cursor += 1;
        if active.cursor < active.lines.len() {
            return;
        }
        let Some(active) = self.active.take() else { return };
        match active.quest {
            Some(mut run) => match run.resume.take() {
                Some(next) => {
                    let stop = self.walk(&mut run, next);
                    self.continue_quest(active.source, run, stop);
                }
                None => self.finish(active.source, Some(run)),
            },
            None => self.finish(active.source, None),
        }
    }

    /// Pick option `index` of the presented choice.
    pub fn choose(&mut self, index: usize) -> bool {
        let valid = self.active.as_ref().map_or(false, |active| index < active.choices.len());
        if !valid {
            return false;
        }
        let Some(active) = self.active.take() else { return false };
        let Some(mut run) = active.quest else {
            self.finish(active.source, None);
            return true;
        };
        let next = run.choice_node.take().and_then(|node| run.graph.successor(node, index));
        match next {
            Some(next) => {
                let stop = self.walk(&mut run, next);
                self.continue_quest(active.source, run, stop);
            }
            None => self.finish(active.source, Some(run)),
        }
        true
    }

    /// End whatever is playing without running any remaining nodes.
    pub fn skip(&mut self) {
        self.interrupt();
    }

    fn interrupt(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(source = %active.source, "dialogue interrupted");
            self.finish(active.source, active.quest);
        }
    }

    fn start_lines(&mut self, source: String, lines: Vec<SpokenLine>, quest: Option<QuestRun>) -> bool {
        self.interrupt();
        if lines.is_empty() {
            debug!(%source, "dialogue has no lines");
            return false;
        }
        self.events.push(DialogueEvent::Started { source: source.clone(), lines: lines.clone() });
        self.active = Some(ActiveDialogue { source, lines, cursor: 0, choices: Vec::new(), quest });
        true
    }

    fn walk(&mut self, run: &mut QuestRun, from: u64) -> WalkStop {
        let mut rewards = Vec::new();
        let stop = QuestWalker {
            graph: &run.graph,
            vars: &mut self.vars,
            conditions: &self.conditions,
            visited: &mut run.visited,
            rewards: &mut rewards,
        }
        .walk_from(from);
        for (item, amount) in rewards {
            info!(%item, amount, owner = run.owner.as_deref(), "quest reward granted");
            self.events.push(DialogueEvent::Reward { item, amount });
        }
        stop
    }

    fn continue_quest(&mut self, source: String, mut run: QuestRun, stop: WalkStop) {
        match stop {
            WalkStop::Say { lines, resume } => {
                run.resume = resume;
                self.events.push(DialogueEvent::Started { source: source.clone(), lines: lines.clone() });
                self.active = Some(ActiveDialogue { source, lines, cursor: 0, choices: Vec::new(), quest: Some(run) });
            }
            WalkStop::Choice { node, options } => {
                if options.is_empty() {
                    warn!(node, "Choice node has no options; ending quest");
                    self.finish(source, Some(run));
                    return;
                }
                run.choice_node = Some(node);
                self.events.push(DialogueEvent::ChoicesPresented { source: source.clone(), options: options.clone() });
                self.active =
                    Some(ActiveDialogue { source, lines: Vec::new(), cursor: 0, choices: options, quest: Some(run) });
            }
            WalkStop::Finished | WalkStop::Halted => self.finish(source, Some(run)),
        }
    }

    fn finish(&mut self, source: String, quest: Option<QuestRun>) {
        self.events.push(DialogueEvent::Ended { source });
        if let Some(run) = quest {
            self.events.push(DialogueEvent::QuestFinished { owner: run.owner, visited: run.visited });
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn graph(json: &str) -> QuestGraph {
        serde_json::from_str(json).expect("graph parses")
    }

    fn branching_check() -> QuestGraph {
        graph(
            r#"{
                "nodes": [
                    {"id": 1, "type": "Start"},
                    {"id": 2, "type": "Check", "properties": {"variable": "sanity", "min": 50}},
                    {"id": 3, "type": "Say", "properties": {"text": "Steady hands."}},
                    {"id": 4, "type": "Say", "properties": {"text": "You are shaking."}}
                ],
                "links": [[1, 1, 0, 2, 0], [2, 2, 0, 3, 0], [3, 2, 1, 4, 0]]
            }"#,
        )
    }

    fn first_line(engine: &DialogueEngine) -> Option<String> {
        engine.current_line().map(|line| line.text.clone())
    }

    #[test]
    fn check_nodes_branch_on_their_condition() {
        let mut engine = DialogueEngine::new();
        engine.vars_mut().set("sanity", json!(80));
        assert!(engine.run_quest(&branching_check(), None));
        assert_eq!(first_line(&engine).as_deref(), Some("Steady hands."));

        engine.skip();
        engine.vars_mut().set("sanity", json!(10));
        assert!(engine.run_quest(&branching_check(), None));
        assert_eq!(first_line(&engine).as_deref(), Some("You are shaking."));
    }

    #[test]
    fn give_nodes_fill_the_inventory_and_finish_in_one_call() {
        let mut engine = DialogueEngine::new();
        let quest = graph(
            r#"{
                "nodes": [
                    {"id": 1, "type": "Start"},
                    {"id": 2, "type": "Give", "properties": {"item": "lantern", "amount": 2}},
                    {"id": 3, "type": "End"}
                ],
                "links": [[1, 1, 0, 2, 0], [2, 2, 0, 3, 0]]
            }"#,
        );

        assert!(engine.run_quest(&quest, Some("Caretaker")), "a graph with a Start node runs");
        assert!(!engine.is_active());
        assert_eq!(engine.vars().inventory_count("lantern"), 2);
        assert_eq!(
            engine.drain_events(),
            vec![
                DialogueEvent::Reward { item: "lantern".into(), amount: 2 },
                DialogueEvent::Ended { source: "quest:Caretaker".into() },
                DialogueEvent::QuestFinished { owner: Some("Caretaker".into()), visited: vec![1, 2, 3] },
            ]
        );
    }

    #[test]
    fn unknown_node_types_halt_the_walk() {
        let mut engine = DialogueEngine::new();
        let quest = graph(
            r#"{
                "nodes": [
                    {"id": 1, "type": "Start"},
                    {"id": 2, "type": "Teleport"},
                    {"id": 3, "type": "Give", "properties": {"item": "key"}}
                ],
                "links": [[1, 1, 0, 2, 0], [2, 2, 0, 3, 0]]
            }"#,
        );

        assert!(engine.run_quest(&quest, None));
        assert!(!engine.is_active());
        assert_eq!(engine.vars().inventory_count("key"), 0, "nothing past the unknown node runs");
        let events = engine.drain_events();
        assert!(matches!(events.first(), Some(DialogueEvent::Ended { source }) if source == "quest"));
        assert!(matches!(events.last(), Some(DialogueEvent::QuestFinished { visited, .. }) if visited == &vec![1]));
    }

    #[test]
    fn graphs_without_a_start_node_do_nothing() {
        let mut engine = DialogueEngine::new();
        let quest = graph(r#"{"nodes": [{"id": 1, "type": "Say", "properties": {"text": "Hello?"}}], "links": []}"#);
        assert!(!engine.run_quest(&quest, None));
        assert!(!engine.run_quest(&QuestGraph::default(), None));
        assert!(!engine.is_active());
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn unknown_dialogue_is_ignored() {
        let mut engine = DialogueEngine::new();
        assert!(!engine.play("missing"));
        assert!(!engine.is_active());
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn lines_advance_until_ended() {
        let mut engine = DialogueEngine::new();
        engine.register(Dialogue {
            id: "intro".into(),
            speaker: Some("Warden".into()),
            lines: vec!["Stay close.".into(), "Lights out soon.".into()],
        });
        assert!(engine.play("intro"));
        assert_eq!(engine.current_line().map(|l| l.text.as_str()), Some("Stay close."));
        engine.advance();
        assert_eq!(engine.current_line().and_then(|l| l.speaker.as_deref()), Some("Warden"));
        engine.advance();
        assert!(!engine.is_active());
        let events = engine.drain_events();
        assert!(matches!(events.last(), Some(DialogueEvent::Ended { source }) if source == "intro"));
    }

    #[test]
    fn inventory_never_goes_negative() {
        let mut vars = DialogueVars::default();
        vars.add_item("key", 1);
        vars.add_item("key", -5);
        assert_eq!(vars.inventory_count("key"), 0);
        assert!(!vars.has_items(&["key".to_string()]));
    }
}

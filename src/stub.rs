//! Offline model backend.
//!
//! [`StubModel`] answers all three worker roles with deterministic,
//! keyword-driven output so the service and the CLI work end to end without
//! an API key. Output is shaped exactly like a real model answer, so it goes
//! through the same worker validation.

use serde_json::json;

use crate::anthropic::{
    AnthropicClient, AnthropicError, MessageSender, MessagesRequest, MessagesResponse,
};
use crate::generate::ONE_SHOT_SUBTASK;
use crate::state_machine::FileMap;
use crate::workers::WorkerRole;
use crate::workers::coder::REVISION_SUBTASK;

const STUB_MODEL: &str = "codeforge-stub";

/// The model the binary hands to the engine.
pub enum ModelBackend {
    Anthropic(AnthropicClient),
    Stub(StubModel),
}

impl ModelBackend {
    pub fn name(&self) -> &'static str {
        match self {
            ModelBackend::Anthropic(_) => "anthropic",
            ModelBackend::Stub(_) => "stub",
        }
    }
}

impl MessageSender for ModelBackend {
    async fn send_message(
        &self,
        req: &MessagesRequest,
    ) -> Result<MessagesResponse, AnthropicError> {
        match self {
            ModelBackend::Anthropic(client) => client.send_message(req).await,
            ModelBackend::Stub(stub) => stub.send_message(req).await,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StubModel;

impl MessageSender for StubModel {
    async fn send_message(
        &self,
        req: &MessagesRequest,
    ) -> Result<MessagesResponse, AnthropicError> {
        let user = req.user_text();
        let reply = match WorkerRole::of(req) {
            Some(WorkerRole::Planner) => plan(field(user, "Task"), field(user, "Framework")),
            Some(WorkerRole::Coder) => code(field(user, "Subtask"), field(user, "Framework")),
            Some(WorkerRole::Reviewer) => review(user),
            None => {
                return Err(AnthropicError::ApiError {
                    status: 400,
                    message: "stub model only answers pipeline workers".into(),
                });
            }
        };
        Ok(MessagesResponse::from_text(STUB_MODEL, reply.to_string()))
    }
}

/// Value of the first `Name: value` line.
fn field<'a>(text: &'a str, name: &str) -> &'a str {
    text.lines()
        .find_map(|line| line.strip_prefix(name)?.strip_prefix(": "))
        .unwrap_or("")
        .trim()
}

fn plan(task: &str, framework: &str) -> serde_json::Value {
    let task_lower = task.to_lowercase();
    let subtasks: Vec<String> = if task_lower.contains("todo") {
        vec![
            "Create main App component with state management".into(),
            "Create TodoList component to display items".into(),
            "Create TodoItem component with completion toggle".into(),
            "Create AddTodo form for adding new items".into(),
            "Add styling with CSS".into(),
        ]
    } else if task_lower.contains("counter") {
        vec![
            "Create main App component".into(),
            "Create Counter component with increment and decrement".into(),
            "Add styling".into(),
        ]
    } else if task_lower.contains("form") {
        vec![
            "Create main App component".into(),
            "Create ContactForm component with validation".into(),
            "Handle form submission feedback".into(),
            "Add styling and feedback messages".into(),
        ]
    } else {
        vec![
            format!("Create main App component for {framework}"),
            "Implement core functionality".into(),
            "Add user interface elements".into(),
            "Add styling and polish".into(),
        ]
    };
    json!({
        "subtasks": subtasks,
        "reasoning": format!("Standard {framework} application structure for: {task}"),
    })
}

fn code(subtask: &str, framework: &str) -> serde_json::Value {
    let files = match subtask {
        ONE_SHOT_SUBTASK => {
            let mut files = component_files("app", framework);
            files.append(&mut component_files("styling", framework));
            files
        }
        REVISION_SUBTASK => component_files("app", framework),
        _ => component_files(subtask, framework),
    };
    json!({
        "files": files,
        "explanation": format!("Stub code for: {subtask}"),
    })
}

fn component_files(subtask: &str, framework: &str) -> FileMap {
    let s = subtask.to_lowercase();
    let (path, content) = match framework {
        "react" => {
            if s.contains("styl") || s.contains("css") {
                ("/styles.css".to_string(), STYLES_CSS.to_string())
            } else if s.contains("todoitem") {
                ("/TodoItem.jsx".to_string(), TODO_ITEM_JSX.to_string())
            } else if s.contains("addtodo") {
                ("/AddTodo.jsx".to_string(), ADD_TODO_JSX.to_string())
            } else if s.contains("todolist") {
                ("/TodoList.jsx".to_string(), TODO_LIST_JSX.to_string())
            } else if s.contains("app") {
                ("/App.jsx".to_string(), APP_JSX.to_string())
            } else {
                let name = component_name(subtask);
                (format!("/components/{name}.jsx"), react_component(&name, subtask))
            }
        }
        "vue" => {
            if s.contains("app") {
                ("/App.vue".to_string(), APP_VUE.to_string())
            } else {
                let name = component_name(subtask);
                (format!("/components/{name}.vue"), vue_component(subtask))
            }
        }
        _ => (
            format!("/src/{}.js", component_name(subtask)),
            format!("// Generated for: {subtask}\nexport {{}};\n"),
        ),
    };
    FileMap::from([(path, content)])
}

/// PascalCase from the alphanumeric words of `subtask`.
fn component_name(subtask: &str) -> String {
    let name: String = subtask
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(4)
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if name.is_empty() {
        "Component".to_string()
    } else {
        name
    }
}

/// Static checks on the `--- path ---` blocks of a review request.
fn review(user: &str) -> serde_json::Value {
    let files = parse_file_blocks(user);
    if files.is_empty() {
        return json!({
            "approved": false,
            "score": 1,
            "feedback": "No files to review",
            "issues": ["No files were generated"],
            "suggestions": ["Generate at least one file"],
        });
    }

    let mut issues = Vec::new();
    for (path, content) in &files {
        if content.trim().is_empty() {
            issues.push(format!("{path}: file is empty"));
        } else if (path.ends_with(".jsx") || path.ends_with(".tsx")) && !content.contains("export")
        {
            issues.push(format!("{path}: missing export statement"));
        } else if path.ends_with(".vue") && !content.contains("<template>") {
            issues.push(format!("{path}: missing <template> section"));
        }
    }
    let mut suggestions = Vec::new();
    if files.len() < 2 {
        suggestions.push("Consider splitting code into multiple components".to_string());
    }
    if !files.keys().any(|p| p.ends_with(".css")) {
        suggestions.push("Consider adding a CSS file for styling".to_string());
    }

    let penalty = u8::try_from(issues.len() * 2).unwrap_or(u8::MAX);
    let score = 8u8.saturating_sub(penalty).max(1);
    let approved = issues.is_empty();
    let feedback = if approved {
        format!("{} file(s) reviewed, no blocking issues", files.len())
    } else {
        format!("{} issue(s) must be fixed", issues.len())
    };
    json!({
        "approved": approved,
        "score": score,
        "feedback": feedback,
        "issues": issues,
        "suggestions": suggestions,
    })
}

fn parse_file_blocks(text: &str) -> FileMap {
    let mut files = FileMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    for line in text.lines() {
        if let Some(path) = line
            .strip_prefix("--- ")
            .and_then(|rest| rest.strip_suffix(" ---"))
        {
            if let Some((path, body)) = current.take() {
                files.insert(path, body.join("\n"));
            }
            current = Some((path.to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((path, body)) = current {
        files.insert(path, body.join("\n"));
    }
    files
}

fn react_component(name: &str, subtask: &str) -> String {
    format!(
        "import React from 'react';\n\
         \n\
         // {subtask}\n\
         export default function {name}() {{\n  \
           return <div className=\"component\" />;\n\
         }}\n"
    )
}

fn vue_component(subtask: &str) -> String {
    format!(
        "<template>\n  <div class=\"component\">\n    <!-- {subtask} -->\n  </div>\n</template>\n\
         \n<script setup>\n</script>\n"
    )
}

const APP_JSX: &str = r#"import React, { useState } from 'react';
import './styles.css';

export default function App() {
  const [items, setItems] = useState([]);

  return (
    <div className="app">
      <h1>My App</h1>
      <p>{items.length} item(s)</p>
    </div>
  );
}
"#;

const TODO_LIST_JSX: &str = r#"import React from 'react';

export default function TodoList({ items, onToggle, onDelete }) {
  return (
    <ul className="todo-list">
      {items.map((item, index) => (
        <li key={index} className={item.completed ? 'completed' : ''}>
          <span onClick={() => onToggle(index)}>{item.text}</span>
          <button onClick={() => onDelete(index)}>Delete</button>
        </li>
      ))}
    </ul>
  );
}
"#;

const TODO_ITEM_JSX: &str = r#"import React from 'react';

export default function TodoItem({ item, onToggle, onDelete }) {
  return (
    <li className={`todo-item ${item.completed ? 'completed' : ''}`}>
      <input type="checkbox" checked={item.completed} onChange={onToggle} />
      <span>{item.text}</span>
      <button onClick={onDelete}>x</button>
    </li>
  );
}
"#;

const ADD_TODO_JSX: &str = r#"import React, { useState } from 'react';

export default function AddTodo({ onAdd }) {
  const [text, setText] = useState('');

  const handleSubmit = (e) => {
    e.preventDefault();
    if (text.trim()) {
      onAdd(text.trim());
      setText('');
    }
  };

  return (
    <form onSubmit={handleSubmit} className="add-todo">
      <input value={text} onChange={(e) => setText(e.target.value)} placeholder="Add new item..." />
      <button type="submit">Add</button>
    </form>
  );
}
"#;

const STYLES_CSS: &str = r#".app {
  max-width: 500px;
  margin: 0 auto;
  padding: 20px;
  font-family: sans-serif;
}

.todo-list {
  list-style: none;
  padding: 0;
}

.todo-item.completed span {
  text-decoration: line-through;
  color: #888;
}
"#;

const APP_VUE: &str = r#"<template>
  <div id="app">
    <h1>My App</h1>
  </div>
</template>

<script setup>
import { ref } from 'vue';

const items = ref([]);
</script>
"#;

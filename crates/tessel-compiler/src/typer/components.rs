//! Component styles and the component dependency graph.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use super::{Symbol, Typer, style_key};
use crate::ast::{CssConfigDefinition, CssDefinition, DefRef, Definition, Item, Location, SourceFile};

/// A top-level style definition waiting to be attached to a component.
enum Attachment {
    Css(CssDefinition),
    Config(CssConfigDefinition),
}

impl Typer<'_> {
    /// Attaches nested and top-level CSS / CSS config definitions to components.
    pub(super) fn attach_styles(&mut self, files: &mut [SourceFile]) {
        for file in files.iter_mut() {
            for item in file.items.iter_mut() {
                if let Item::Definition(Definition::Component(component)) = item {
                    component.typed.css = component.css.clone();
                    component.typed.css_config = component.css_config.clone();
                }
            }
        }

        let mut attachments: Vec<(DefRef, Attachment, String, Location)> = Vec::new();
        for (file_index, file) in files.iter().enumerate() {
            for (item_index, item) in file.items.iter().enumerate() {
                let this = DefRef {
                    file: file_index,
                    item: item_index,
                };
                let (name, kind, attachment, location) = match item {
                    Item::Definition(Definition::Css(css)) => match &css.name {
                        Some(name) => (name, "css", Attachment::Css(css.clone()), css.location),
                        None => continue,
                    },
                    Item::Definition(Definition::CssConfig(config)) => match &config.name {
                        Some(name) => (name, "css_config", Attachment::Config(config.clone()), config.location),
                        None => continue,
                    },
                    _ => continue,
                };
                // Later duplicates were already reported during collection.
                let winner = match self.scope.get_symbol(&style_key(name, kind)) {
                    Some(Symbol::CssDefinition { def }) | Some(Symbol::CssConfigDefinition { def }) => def,
                    _ => continue,
                };
                if winner != this {
                    continue;
                }
                match self.scope.get_symbol(name) {
                    Some(Symbol::HtmlComponentDefinition { def, .. }) => {
                        attachments.push((def, attachment, file.path.clone(), location));
                    }
                    _ => self.diagnostics.push(
                        &file.path,
                        location.line,
                        format!("{} definition \"{}\" does not match any component", kind, name),
                    ),
                }
            }
        }

        for (def, attachment, path, location) in attachments {
            let Some(Item::Definition(Definition::Component(component))) =
                files.get_mut(def.file).and_then(|file| file.items.get_mut(def.item))
            else {
                continue;
            };
            let name = component.display_name();
            let (slot_taken, kind) = match &attachment {
                Attachment::Css(_) => (component.typed.css.is_some(), "css"),
                Attachment::Config(_) => (component.typed.css_config.is_some(), "css_config"),
            };
            if slot_taken {
                self.diagnostics.push(
                    &path,
                    location.line,
                    format!("component \"{}\" has more than one {} definition", name, kind),
                );
                continue;
            }
            trace!(component = %name, kind, "attached top-level style");
            match attachment {
                Attachment::Css(css) => component.typed.css = Some(css),
                Attachment::Config(config) => component.typed.css_config = Some(config),
            }
        }
    }

    /// Reports dependency cycles and returns each component's transitive
    /// dependency map.
    pub(super) fn resolve_dependencies(&mut self) -> BTreeMap<String, BTreeMap<String, Location>> {
        let names: Vec<String> = self.dependencies.keys().cloned().collect();
        let mut done = BTreeSet::new();
        for name in &names {
            if !done.contains(name) {
                let mut visiting = Vec::new();
                self.visit_component(name, &mut visiting, &mut done);
            }
        }
        names
            .iter()
            .map(|name| (name.clone(), self.dependency_closure(name)))
            .collect()
    }

    fn visit_component(&mut self, name: &str, visiting: &mut Vec<String>, done: &mut BTreeSet<String>) {
        visiting.push(name.to_string());
        let edges: Vec<(String, Location)> = self
            .dependencies
            .get(name)
            .map(|edges| edges.iter().map(|(dep, at)| (dep.clone(), *at)).collect())
            .unwrap_or_default();

        for (dependency, location) in edges {
            if let Some(start) = visiting.iter().position(|n| *n == dependency) {
                let mut cycle = visiting[start..].to_vec();
                cycle.push(dependency.clone());
                let file = self.component_files.get(name).cloned().unwrap_or_default();
                self.diagnostics.push(
                    &file,
                    location.line,
                    format!(
                        "cyclic reference to component \"{}\": {}",
                        dependency,
                        cycle.join(" -> ")
                    ),
                );
            } else if !done.contains(&dependency) && self.dependencies.contains_key(&dependency) {
                self.visit_component(&dependency, visiting, done);
            }
        }

        visiting.pop();
        done.insert(name.to_string());
    }

    fn dependency_closure(&self, name: &str) -> BTreeMap<String, Location> {
        let mut closed = BTreeMap::new();
        let mut pending = vec![name];
        while let Some(current) = pending.pop() {
            let Some(edges) = self.dependencies.get(current) else {
                continue;
            };
            for (dependency, location) in edges {
                if !closed.contains_key(dependency) {
                    closed.insert(dependency.clone(), *location);
                    pending.push(dependency.as_str());
                }
            }
        }
        closed
    }
}

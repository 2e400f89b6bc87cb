use std::env;
use std::fs;
use std::path::Path;

use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::config::{find_project_root, Config};
use crate::entity::{GlobalSettings, PromptNode, Template};
use crate::error::{ArborError, Result};
use crate::instantiate::{InstantiateOptions, InstantiateRequest, TreeInstantiator};
use crate::reorder::reorder;
use crate::storage::LoroStore;
use crate::variables::{seed_initial_values, VariableClass, VariableRegistry};
use crate::warnings::format_warning;

pub fn handle_init() -> Result<()> {
    let root = env::current_dir()?;

    let store = LoroStore::init(&root)?;
    Config::default().save(store.arbor_dir())?;

    println!("Initialized arbor project in {}", root.display());

    Ok(())
}

pub async fn handle_instantiate(
    template_path: &Path,
    parent: Option<String>,
    name: Option<String>,
    vars: Vec<String>,
    no_reference_warnings: bool,
    json: bool,
) -> Result<()> {
    let root = find_project_root();
    let store = LoroStore::open(&root)?;
    let config = Config::load(store.arbor_dir())?.with_env();

    let registry = VariableRegistry::default();
    let template = Template::load(template_path, &registry)?;

    // Seeded values first, then explicit --var overrides
    let mut values = seed_initial_values(
        &registry,
        &template.placeholder_names(),
        &template.variables,
        &config.static_context(),
    );
    for var in &vars {
        let (k, v) = parse_var_string(var)?;
        values.insert(k, v);
    }

    let parent_id = parent.map(|p| store.resolve_node_id(&p)).transpose()?;

    let mut request = InstantiateRequest::new(&template);
    request.parent_id = parent_id;
    request.root_name = name;
    request.values = values;
    request.created_by = config.acting_user();

    let options = InstantiateOptions {
        warn_on_references: !no_reference_warnings,
        ..Default::default()
    };
    let result = TreeInstantiator::new(&store, &registry)
        .with_options(options)
        .instantiate(request)
        .await;

    // Nodes created before a failure stay, so persist them either way
    store.save()?;
    let report = result?;

    for warning in &report.warnings {
        eprintln!("{}", format_warning(warning));
    }

    if json {
        let output = json!({
            "root": report.root,
            "nodes": report.nodes,
            "conversations": report.conversations,
            "warnings": report.warnings.iter().map(format_warning).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "Created {} node(s) from template '{}' - root ({}) {}",
            report.nodes.len(),
            template.name,
            report.root.short_id(),
            report.root.name
        );
        if !report.conversations.is_empty() {
            println!("  with {} conversation(s)", report.conversations.len());
        }
    }

    Ok(())
}

pub async fn handle_move(
    id: String,
    parent: Option<String>,
    to_root: bool,
    index: usize,
    json: bool,
) -> Result<()> {
    let root = find_project_root();
    let store = LoroStore::open(&root)?;

    let node_id = store.resolve_node_id(&id)?;
    let node = store
        .get_node_record(&node_id)?
        .ok_or_else(|| ArborError::NodeNotFound(id.clone()))?;

    let new_parent_id = if to_root {
        None
    } else if let Some(p) = parent {
        Some(store.resolve_node_id(&p)?)
    } else {
        node.parent_id
    };

    let sibling_ids: Vec<Uuid> = store
        .children_of(new_parent_id)?
        .into_iter()
        .map(|n| n.id)
        .collect();
    debug!(siblings = sibling_ids.len(), "resolved move target");

    let key = reorder(&store, node_id, new_parent_id, index, &sibling_ids).await?;
    store.save()?;

    if json {
        let moved = store
            .get_node_record(&node_id)?
            .ok_or_else(|| ArborError::NodeNotFound(id.clone()))?;
        println!("{}", serde_json::to_string_pretty(&moved)?);
    } else {
        println!(
            "Moved ({}) {} to index {} (key {})",
            node.short_id(),
            node.name,
            index,
            key
        );
    }

    Ok(())
}

pub fn handle_tree(id: Option<String>, json: bool) -> Result<()> {
    let root = find_project_root();
    let store = LoroStore::open(&root)?;
    let nodes = store.list_nodes()?;

    let tops: Vec<&PromptNode> = match id {
        Some(id) => {
            let node_id = store.resolve_node_id(&id)?;
            nodes.iter().filter(|n| n.id == node_id).collect()
        }
        None => nodes.iter().filter(|n| n.is_root()).collect(),
    };

    if json {
        let trees = tops
            .iter()
            .map(|n| subtree_json(n, &nodes))
            .collect::<Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&trees)?);
    } else if tops.is_empty() {
        println!("No nodes found.");
    } else {
        for top in tops {
            print_subtree(top, &nodes, 0);
        }
    }

    Ok(())
}

fn children<'a>(nodes: &'a [PromptNode], parent: &PromptNode) -> Vec<&'a PromptNode> {
    // list_nodes is sorted by key, so children come out in display order
    nodes
        .iter()
        .filter(|n| n.parent_id == Some(parent.id))
        .collect()
}

fn print_subtree(node: &PromptNode, nodes: &[PromptNode], depth: usize) {
    println!(
        "{}({}) [{}] {}",
        "  ".repeat(depth),
        node.short_id(),
        node.position_key,
        node.name
    );
    for child in children(nodes, node) {
        print_subtree(child, nodes, depth + 1);
    }
}

fn subtree_json(node: &PromptNode, nodes: &[PromptNode]) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(node)?;
    let kids = children(nodes, node)
        .into_iter()
        .map(|c| subtree_json(c, nodes))
        .collect::<Result<Vec<_>>>()?;
    if let serde_json::Value::Object(ref mut map) = value {
        map.insert("children".to_string(), serde_json::Value::Array(kids));
    }
    Ok(value)
}

pub fn handle_variables(template_path: &Path, json: bool) -> Result<()> {
    let root = find_project_root();
    let arbor_dir = root.join(".arbor");
    let config = Config::load(&arbor_dir)?.with_env();

    let registry = VariableRegistry::default();
    let template = Template::load(template_path, &registry)?;

    let mut names = template.placeholder_names();
    names.extend(template.variables.iter().map(|d| d.name.clone()));
    let values = seed_initial_values(&registry, &names, &template.variables, &config.static_context());

    let rows: Vec<(String, VariableClass, Option<String>)> = names
        .into_iter()
        .map(|name| {
            let class = registry.class_in(&template.variables, &name);
            let value = values.get(&name).cloned();
            (name, class, value)
        })
        .collect();

    if json {
        let output: Vec<serde_json::Value> = rows
            .iter()
            .map(|(name, class, value)| json!({ "name": name, "class": class, "value": value }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if rows.is_empty() {
        println!("Template '{}' uses no variables.", template.name);
    } else {
        println!("Variables of '{}':\n", template.name);
        for (name, class, value) in rows {
            match value {
                Some(v) if !v.is_empty() => println!("  {} [{}] = {}", name, class, v),
                Some(_) => println!("  {} [{}]", name, class),
                None => println!("  {} [{}] (resolved later)", name, class),
            }
        }
    }

    Ok(())
}

pub fn handle_settings(file: &Path) -> Result<()> {
    let root = find_project_root();
    let store = LoroStore::open(&root)?;

    let text = fs::read_to_string(file)?;
    let settings: GlobalSettings = serde_yaml::from_str(&text)?;
    store.put_global_settings(&settings)?;
    store.save()?;

    println!(
        "Imported settings: default model {}, {} model profile(s)",
        settings.default_model.as_deref().unwrap_or("(none)"),
        settings.models.len()
    );

    Ok(())
}

pub fn handle_delete(id: String) -> Result<()> {
    let root = find_project_root();
    let store = LoroStore::open(&root)?;

    let node_id = store.resolve_node_id(&id)?;
    let node = store
        .get_node_record(&node_id)?
        .ok_or_else(|| ArborError::NodeNotFound(id.clone()))?;

    let count = store.delete_node(&node_id)?;
    store.save()?;

    println!(
        "Deleted ({}) {} and {} descendant(s)",
        node.short_id(),
        node.name,
        count.saturating_sub(1)
    );

    Ok(())
}

/// Parse a variable string in format "name=value"
fn parse_var_string(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(ArborError::InvalidVariableName {
            name: s.to_string(),
            reason: "expected format 'name=value'".to_string(),
        }),
    }
}

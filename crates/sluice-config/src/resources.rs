//! Phase 2: resource declarations and their namespace.
//!
//! Every resource gets the qualified name `role.kind.name`. The namespace
//! scope exposes one object per role so that `produce.http.a` evaluates to the
//! string `"produce.http.a"`, and the lookup table maps that string back to
//! the resource.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use sluice_lang::{evaluate_flat_body, Body, Scope, Value};
use sluice_types::{Result, SluiceError};

use crate::model::{qualified_name, Resource, Role};

/// A resource block before its attributes are evaluated.
struct Declaration<'a> {
    role: Role,
    kind: &'a str,
    name: &'a str,
    body: &'a Body,
}

impl Declaration<'_> {
    fn qualified_name(&self) -> String {
        qualified_name(self.role, self.kind, self.name)
    }
}

fn declarations(body: &Body) -> Result<Vec<Declaration<'_>>> {
    let mut out = Vec::new();
    for block in &body.blocks {
        let Some(role) = Role::from_resource_keyword(&block.ident) else {
            continue;
        };
        let (kind, name) = match block.labels.as_slice() {
            [kind] => (kind.as_str(), kind.as_str()),
            [kind, name] => (kind.as_str(), name.as_str()),
            labels => {
                return Err(SluiceError::InvalidBlock {
                    block: block.ident.clone(),
                    message: format!(
                        "expected labels \"kind\" or \"kind\" \"name\", found {}",
                        labels.len()
                    ),
                })
            }
        };
        out.push(Declaration {
            role,
            kind,
            name,
            body: &block.body,
        });
    }
    Ok(out)
}

/// The resolved resources of one unit.
#[derive(Debug, Clone)]
pub struct Namespace {
    scope: Scope,
    lookup: HashMap<String, Arc<Resource>>,
    pub remote_producers: Vec<Arc<Resource>>,
    pub producers: Vec<Arc<Resource>>,
    pub consumers: Vec<Arc<Resource>>,
    pub transformers: Vec<Arc<Resource>>,
}

impl Namespace {
    /// Collect the resource blocks of `body`, build the namespace scope and
    /// evaluate each resource's attributes against `values` composed with it.
    pub fn build(body: &Body, values: &Scope) -> Result<Namespace> {
        let declarations = declarations(body)?;

        // role -> kind -> name -> "role.kind.name"
        let mut roots: BTreeMap<Role, BTreeMap<String, BTreeMap<String, Value>>> = Role::RESOURCE_ROLES
            .into_iter()
            .map(|role| (role, BTreeMap::new()))
            .collect();

        // keyed on the qualified name: `"a.b" "c"` and `"a" "b.c"` collide
        let mut seen = HashSet::with_capacity(declarations.len());
        for decl in &declarations {
            let qualified = decl.qualified_name();
            if !seen.insert(qualified.clone()) {
                return Err(SluiceError::DuplicateDeclaration { name: qualified });
            }
            roots
                .entry(decl.role)
                .or_default()
                .entry(decl.kind.to_string())
                .or_default()
                .insert(decl.name.to_string(), Value::String(qualified));
        }

        let scope = roots
            .into_iter()
            .fold(Scope::builder(), |builder, (role, kinds)| {
                let kinds = kinds
                    .into_iter()
                    .map(|(kind, names)| (kind, Value::Object(names)))
                    .collect();
                builder.variable(role.keyword(), Value::Object(kinds))
            })
            .build();
        let eval_scope = Scope::compose(values, &scope);

        let mut namespace = Namespace {
            scope,
            lookup: HashMap::with_capacity(declarations.len()),
            remote_producers: Vec::new(),
            producers: Vec::new(),
            consumers: Vec::new(),
            transformers: Vec::new(),
        };

        for decl in declarations {
            let qualified = decl.qualified_name();
            let attributes = evaluate_flat_body(decl.role.keyword(), decl.body, &eval_scope)
                .map_err(|e| match e {
                    SluiceError::DuplicateDeclaration { name } => SluiceError::DuplicateDeclaration {
                        name: format!("{qualified}.{name}"),
                    },
                    other => other,
                })?;
            let resource = Arc::new(Resource {
                role: decl.role,
                kind: decl.kind.to_string(),
                name: decl.name.to_string(),
                attributes,
            });
            debug!(resource = %qualified, "declared resource");

            match decl.role {
                Role::ProduceFrom => namespace.remote_producers.push(Arc::clone(&resource)),
                Role::Produce => namespace.producers.push(Arc::clone(&resource)),
                Role::Consume => namespace.consumers.push(Arc::clone(&resource)),
                Role::Transform => namespace.transformers.push(Arc::clone(&resource)),
                Role::Value => {}
            }
            namespace.lookup.insert(qualified, resource);
        }

        Ok(namespace)
    }

    /// Scope holding one object per resource role. It has no parent.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Resource by qualified name.
    pub fn lookup(&self, qualified_name: &str) -> Option<&Arc<Resource>> {
        self.lookup.get(qualified_name)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_lang::parse;

    fn build(src: &str) -> Result<Namespace> {
        let body = parse("r.sluice", src)?;
        Namespace::build(&body, &Scope::empty())
    }

    #[test]
    fn namespace_maps_qualified_names() {
        let ns = build(
            "produce \"http\" \"a\" { url = \"x\" }\nconsume \"file\" \"b\" {}\ntransform \"gzip\" {}",
        )
        .unwrap();

        assert_eq!(ns.len(), 3);
        let a = ns.lookup("produce.http.a").unwrap();
        assert_eq!(a.kind, "http");
        assert_eq!(a.attributes.get("url"), Some(&Value::from("x")));
        assert!(ns.lookup("transform.gzip.gzip").is_some());

        let produce = ns.scope().variable("produce").unwrap();
        assert_eq!(produce.as_object().unwrap()["http"].as_object().unwrap()["a"], Value::from("produce.http.a"));
    }

    #[test]
    fn empty_roles_are_still_defined() {
        let ns = build("").unwrap();
        assert!(ns.is_empty());
        for role in Role::RESOURCE_ROLES {
            assert_eq!(
                ns.scope().variable(role.keyword()),
                Some(&Value::Object(BTreeMap::new()))
            );
        }
    }

    #[test]
    fn resources_can_reference_each_other() {
        let ns = build(
            "consume \"file\" \"b\" { dead-letter = consume.file.dlq }\nconsume \"file\" \"dlq\" {}",
        )
        .unwrap();
        assert_eq!(
            ns.lookup("consume.file.b").unwrap().attributes["dead-letter"],
            Value::from("consume.file.dlq")
        );
        let names: Vec<_> = ns.consumers.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "dlq"]);
    }

    #[test]
    fn duplicate_triple_is_rejected() {
        let err = build("produce \"http\" \"a\" {}\nproduce \"http\" \"a\" {}").unwrap_err();
        assert!(matches!(err, SluiceError::DuplicateDeclaration { ref name } if name == "produce.http.a"));
    }

    #[test]
    fn dotted_labels_colliding_on_qualified_name_are_rejected() {
        let err = build("produce \"a.b\" \"c\" { which = 1 }\nproduce \"a\" \"b.c\" { which = 2 }")
            .unwrap_err();
        assert!(matches!(err, SluiceError::DuplicateDeclaration { ref name } if name == "produce.a.b.c"));
    }

    #[test]
    fn dotted_label_without_collision_resolves() {
        let ns = build("produce \"a.b\" \"c\" { which = 1 }").unwrap();
        assert_eq!(ns.lookup("produce.a.b.c").unwrap().kind, "a.b");
    }

    #[test]
    fn same_name_in_different_roles_is_allowed() {
        let ns = build("produce \"http\" \"a\" {}\nconsume \"http\" \"a\" {}").unwrap();
        assert_eq!(ns.len(), 2);
    }

    #[test]
    fn label_count_is_checked() {
        let err = build("produce {}").unwrap_err();
        assert!(matches!(err, SluiceError::InvalidBlock { .. }));
        let err = build("produce \"a\" \"b\" \"c\" {}").unwrap_err();
        assert!(matches!(err, SluiceError::InvalidBlock { .. }));
    }
}

//! End-to-end record transformation tests
//!
//! Drives whole records through the registered filter chain the way the
//! delivery pipeline does: flat field section reassembled first, block
//! content rewritten second, with in-memory collaborators standing in for
//! the origin registry, the identity tables and the destination read API.

mod support {
    use std::collections::HashMap;
    use std::sync::Arc;

    use crossport_core::{
        DestinationInstance, FieldDeclaration, FieldKind, InMemoryRegistry, MappingKind,
        MediaBridge, RemoteCollection, RemoteIndex, RemoteMatch, Resolver, StaticKeySource,
        TableIdentityMap,
    };
    use url::Url;

    pub struct MapMediaBridge(pub HashMap<u64, u64>);

    impl MediaBridge for MapMediaBridge {
        fn crosspost(&self, source_media_id: u64, _d: &DestinationInstance) -> Option<u64> {
            self.0.get(&source_media_id).copied()
        }
    }

    #[derive(Default)]
    pub struct StaticRemote {
        pub terms: HashMap<String, u64>,
        pub users: HashMap<String, u64>,
    }

    impl RemoteIndex for StaticRemote {
        fn find(
            &self,
            _d: &DestinationInstance,
            collection: &RemoteCollection,
            keys: &[String],
        ) -> Vec<RemoteMatch> {
            let table = match collection {
                RemoteCollection::Terms { .. } => &self.terms,
                RemoteCollection::Users => &self.users,
            };
            keys.iter()
                .filter_map(|key| {
                    table.get(key).map(|&id| RemoteMatch {
                        id,
                        slug: key.clone(),
                    })
                })
                .collect()
        }
    }

    pub fn destination() -> DestinationInstance {
        DestinationInstance::new(
            "docs-site",
            Url::parse("https://docs.example.com/wp-json/").unwrap(),
        )
        .with_auth("syndication", "app-password")
    }

    pub fn registry() -> InMemoryRegistry {
        let hero_layout = vec![
            FieldDeclaration::leaf("field_6", "heading", FieldKind::Scalar),
            FieldDeclaration::leaf("field_7", "image", FieldKind::Media),
        ];
        InMemoryRegistry::new()
            .with_declaration(FieldDeclaration::leaf("field_1", "price", FieldKind::Scalar))
            .with_declaration(FieldDeclaration::leaf("field_2", "gallery", FieldKind::Media))
            .with_declaration(FieldDeclaration::leaf("field_3", "related", FieldKind::Entity))
            .with_declaration(FieldDeclaration {
                taxonomy: Some("category".to_string()),
                ..FieldDeclaration::leaf("field_4", "topics", FieldKind::Taxonomy)
            })
            .with_declaration(FieldDeclaration {
                layouts: vec![("hero".to_string(), hero_layout)],
                ..FieldDeclaration::leaf("field_5", "sections", FieldKind::Flexible)
            })
            .with_declaration(FieldDeclaration::leaf("field_10", "title", FieldKind::Scalar))
            .with_pointer(7, "price", "field_1")
            .with_pointer(7, "gallery", "field_2")
            .with_pointer(7, "related", "field_3")
            .with_pointer(7, "topics", "field_4")
            .with_pointer(7, "sections", "field_5")
    }

    pub fn resolver() -> Resolver {
        Resolver::builder()
            .identity_map(Arc::new(TableIdentityMap::new().with_mapping(
                MappingKind::Entity,
                "docs-site",
                5,
                205,
            )))
            .media_bridge(Arc::new(MapMediaBridge(HashMap::from([(5, 105), (6, 106)]))))
            .key_source(Arc::new(StaticKeySource::new().with_term(21, "news")))
            .remote_index(Arc::new(StaticRemote {
                terms: HashMap::from([("news".to_string(), 31)]),
                users: HashMap::new(),
            }))
            .build()
            .unwrap()
    }
}

use std::sync::Arc;

use crossport_core::blocks::escape::escape_leaf;
use crossport_core::blocks::{parse_document, serialize_document};
use crossport_core::{Crossposter, EscapeContext, FilterChain, ObjectKind};
use proptest::prelude::*;
use serde_json::json;

fn crossposter() -> Arc<Crossposter> {
    Arc::new(Crossposter::new(
        Arc::new(support::registry()),
        support::resolver(),
    ))
}

#[test]
fn full_post_record_through_filter_chain() {
    let core = crossposter();
    let mut chain = FilterChain::new();
    core.register(&mut chain, ObjectKind::Post);

    let record = json!({
        "id": 7,
        "meta": {
            "price": "",
            "_price": "field_1",
            "gallery": "[5,9]",
            "_gallery": "field_2",
            "related": [5],
            "_related": "field_3",
            "topics": [21],
            "_topics": "field_4",
            "sections": ["hero"],
            "_sections": "field_5",
            "sections_0_heading": "Welcome",
            "_sections_0_heading": "field_6",
            "sections_0_image": 6,
            "_sections_0_image": "field_7",
            "legacy_note": "keep me"
        },
        "content": concat!(
            "<!-- wp:paragraph -->\n<p>Intro</p>\n<!-- /wp:paragraph -->\n\n",
            "<!-- wp:acf/hero {\"data\":{\"title\":\"Hi\",\"_title\":\"field_10\"}} /-->",
        )
    });

    let out = chain.apply(record, &support::destination());

    assert_eq!(
        out["acf"],
        json!({
            "price": null,
            "gallery": [105],
            "related": [205],
            "topics": [31],
            "sections": [
                { "heading": "Welcome", "image": 106, "acf_fc_layout": "hero" }
            ]
        })
    );

    // Matched flat entries and their pointers are gone; everything else,
    // including the separately addressed row data, stays behind.
    let meta = out["meta"].as_object().unwrap();
    assert!(!meta.contains_key("price"));
    assert!(!meta.contains_key("_price"));
    assert!(!meta.contains_key("sections"));
    assert_eq!(meta["legacy_note"], "keep me");
    assert_eq!(meta["sections_0_heading"], "Welcome");

    // The unmanaged paragraph round-tripped byte for byte and the managed
    // hero block kept its scalar payload.
    let content = out["content"].as_str().unwrap();
    assert!(content.starts_with("<!-- wp:paragraph -->\n<p>Intro</p>\n<!-- /wp:paragraph -->\n\n"));
    assert!(content.ends_with("<!-- wp:acf/hero {\"data\":{\"title\":\"Hi\",\"_title\":\"field_10\"}} /-->"));
}

#[test]
fn catalog_item_record_rewrites_meta_data_and_description() {
    let core = crossposter();
    let record = json!({
        "id": 7,
        "meta_data": [
            { "id": 11, "key": "gallery", "value": "[5,9]" },
            { "id": 12, "key": "_gallery", "value": "field_2" },
            { "id": 13, "key": "sku_note", "value": "unmanaged" }
        ],
        "description": "<p>No blocks here.</p>"
    });

    let out = core.transform_catalog_item(record, &support::destination());
    assert_eq!(
        out["meta_data"],
        json!([
            { "id": 11, "key": "gallery", "value": [105] },
            { "id": 13, "key": "sku_note", "value": "unmanaged" }
        ])
    );
    assert_eq!(out["description"], "<p>No blocks here.</p>");
}

#[test]
fn term_record_transforms_fields_only() {
    let core = crossposter();
    let record = json!({
        "id": 7,
        "meta": { "price": "12", "_price": "field_1" }
    });
    let out = core.transform_term(record, &support::destination());
    assert_eq!(out["acf"]["price"], "12");
}

#[test]
fn unresolvable_references_never_abort_the_walk() {
    // One field resolves, its sibling folds to the zero sentinel; the run
    // carries on.
    let core = crossposter();
    let record = json!({
        "id": 7,
        "meta": {
            "related": [999],
            "_related": "field_3",
            "price": "5",
            "_price": "field_1"
        }
    });
    let out = core.transform_post(record, &support::destination());
    assert_eq!(out["acf"]["related"], 0);
    assert_eq!(out["acf"]["price"], "5");
}

proptest! {
    /// Escaped leaves never leak a structural character into the payload.
    #[test]
    fn prop_escaped_leaf_has_no_structural_characters(value in ".*") {
        let ctx = EscapeContext::default();
        let mut out = String::new();
        escape_leaf(&value, &ctx, &mut out);
        prop_assert!(!out.contains('\n'));
        prop_assert!(!out.contains('\r'));
        prop_assert!(!out.contains('\t'));
        prop_assert!(!out.contains('<'));
        prop_assert!(!out.contains('>'));
        prop_assert!(!out.contains('"'));
    }

    /// Documents of plain paragraphs and void blocks serialize back to
    /// their source text exactly.
    #[test]
    fn prop_non_managed_documents_round_trip(
        body in "[A-Za-z0-9 .,!?]{0,40}",
        tail in "[A-Za-z0-9 ]{0,20}",
    ) {
        let doc = format!(
            "<!-- wp:paragraph -->\n<p>{body}</p>\n<!-- /wp:paragraph -->\n\n<!-- wp:spacer /-->\n{tail}"
        );
        let nodes = parse_document(&doc);
        let out = serialize_document(&nodes, &EscapeContext::default());
        prop_assert_eq!(out, doc);
    }
}

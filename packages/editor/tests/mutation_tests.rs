//! Mutation tests against the block tree

use blockframe_editor::{
    get_block_by_path, path_of, Block, BlockKind, BlockTree, BlockType, IdGenerator, Mutation, MutationError,
    MutationOutcome,
};
use serde_json::json;

fn text(id: &str, content: &str) -> Block {
    Block::new(BlockKind::Text {
        content: content.to_string(),
    })
    .with_id(id)
}

fn container(id: &str, children: Vec<Block>) -> Block {
    children
        .into_iter()
        .fold(Block::of_type(BlockType::Container).with_id(id), Block::with_child)
}

fn sample() -> BlockTree {
    BlockTree::from_blocks(vec![
        container("a", vec![text("a1", "one"), text("a2", "two")]),
        text("b", "three"),
        container("c", vec![]),
    ])
    .unwrap()
}

#[test]
fn test_add_with_path_shifts_later_siblings() {
    let mut tree = sample();
    let mut ids = IdGenerator::from_seed("x");

    let outcome = Mutation::AddBlock {
        block: Block::of_type(BlockType::Divider),
        parent_id: None,
        path: Some("0/1".parse().unwrap()),
    }
    .apply(&mut tree, &mut ids)
    .unwrap();

    let MutationOutcome::Added(id) = outcome else {
        panic!("Expected Added");
    };
    assert_eq!(
        tree.get("a").unwrap().children,
        vec!["a1".to_string(), id.clone(), "a2".to_string()]
    );
    assert_eq!(tree.get(&id).unwrap().parent.as_deref(), Some("a"));
    assert_eq!(path_of(&tree, "a2").unwrap().to_string(), "0/2");
    tree.check_invariants().unwrap();
}

#[test]
fn test_add_without_path_appends() {
    let mut tree = sample();
    let mut ids = IdGenerator::from_seed("x");

    Mutation::AddBlock {
        block: Block::of_type(BlockType::Image),
        parent_id: Some("c".to_string()),
        path: None,
    }
    .apply(&mut tree, &mut ids)
    .unwrap();
    Mutation::AddBlock {
        block: Block::of_type(BlockType::Video),
        parent_id: None,
        path: None,
    }
    .apply(&mut tree, &mut ids)
    .unwrap();

    let in_c = &tree.get("c").unwrap().children;
    assert_eq!(in_c.len(), 1);
    assert_eq!(tree.get(&in_c[0]).unwrap().data.block_type(), BlockType::Image);
    let last_root = tree.roots().last().unwrap();
    assert_eq!(tree.get(last_root).unwrap().data.block_type(), BlockType::Video);
}

#[test]
fn test_add_into_missing_container_is_rejected() {
    let mut tree = sample();
    let mut ids = IdGenerator::from_seed("x");
    let before = tree.clone();

    let by_id = Mutation::AddBlock {
        block: Block::of_type(BlockType::Text),
        parent_id: Some("nope".to_string()),
        path: None,
    }
    .apply(&mut tree, &mut ids);
    let by_path = Mutation::AddBlock {
        block: Block::of_type(BlockType::Text),
        parent_id: None,
        path: Some("9/0".parse().unwrap()),
    }
    .apply(&mut tree, &mut ids);

    assert_eq!(by_id, Err(MutationError::ParentNotFound("nope".to_string())));
    assert!(matches!(by_path, Err(MutationError::PathNotFound(_))));
    assert_eq!(tree, before);
}

#[test]
fn test_remove_leaves_no_trace() {
    let mut tree = sample();
    let mut ids = IdGenerator::from_seed("x");

    let outcome = Mutation::RemoveBlock {
        block_id: "a".to_string(),
    }
    .apply(&mut tree, &mut ids)
    .unwrap();

    let MutationOutcome::Removed(removed) = outcome else {
        panic!("Expected Removed");
    };
    assert_eq!(removed.ids(), vec!["a", "a1", "a2"]);
    for id in ["a", "a1", "a2"] {
        assert!(!tree.contains(id));
    }
    assert_eq!(tree.roots(), &["b".to_string(), "c".to_string()]);
    tree.check_invariants().unwrap();
}

#[test]
fn test_update_keeps_children_unless_given() {
    let mut tree = sample();
    let mut ids = IdGenerator::from_seed("x");

    let patch = json!({ "allowNesting": false, "level": 3 });
    Mutation::UpdateBlock {
        block_id: "a".to_string(),
        patch: patch.as_object().unwrap().clone(),
    }
    .apply(&mut tree, &mut ids)
    .unwrap();

    let node = tree.get("a").unwrap();
    assert!(!node.data.allow_nesting);
    assert_eq!(node.data.level, 3);
    assert_eq!(node.children.len(), 2);
}

#[test]
fn test_update_cannot_change_id() {
    let mut tree = sample();
    let mut ids = IdGenerator::from_seed("x");

    let result = Mutation::UpdateBlock {
        block_id: "b".to_string(),
        patch: json!({ "id": "z" }).as_object().unwrap().clone(),
    }
    .apply(&mut tree, &mut ids);

    assert!(matches!(result, Err(MutationError::InvalidPatch(_))));
    assert!(tree.contains("b"));
}

#[test]
fn test_duplicate_gives_fresh_ids_and_keeps_form_refs() {
    let form = Block::new(BlockKind::Form {
        form_id: Some("signup".to_string()),
    })
    .with_id("f");
    let mut tree = BlockTree::from_blocks(vec![container("a", vec![form])]).unwrap();
    let mut ids = IdGenerator::from_seed("x");

    let outcome = Mutation::DuplicateBlock {
        block_id: "a".to_string(),
    }
    .apply(&mut tree, &mut ids)
    .unwrap();

    let MutationOutcome::Duplicated(copy) = outcome else {
        panic!("Expected Duplicated");
    };
    let copy_block = tree.subtree(&copy).unwrap();
    let original = tree.subtree("a").unwrap();

    assert_eq!(tree.roots(), &["a".to_string(), copy.clone()]);
    assert_eq!(copy_block.without_ids(), original.without_ids());
    assert!(copy_block.ids().iter().all(|id| !original.ids().contains(id)));
    assert_eq!(copy_block.blocks[0].data.kind.form_id(), Some("signup"));
    tree.check_invariants().unwrap();
}

#[test]
fn test_duplicate_missing_block() {
    let mut tree = sample();
    let mut ids = IdGenerator::from_seed("x");

    let result = Mutation::DuplicateBlock {
        block_id: "ghost".to_string(),
    }
    .apply(&mut tree, &mut ids);

    assert_eq!(result, Err(MutationError::NodeNotFound("ghost".to_string())));
}

#[test]
fn test_move_child_to_root_scenario() {
    let mut tree = BlockTree::from_blocks(vec![container("a", vec![text("b", "hi")])]).unwrap();
    let mut ids = IdGenerator::from_seed("x");

    Mutation::MoveBlock {
        from: "0/0".parse().unwrap(),
        to: "1".parse().unwrap(),
    }
    .apply(&mut tree, &mut ids)
    .unwrap();

    let blocks = tree.to_blocks();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].id, "a");
    assert!(blocks[0].blocks.is_empty());
    assert_eq!(blocks[1].id, "b");
    assert_eq!(blocks[1].parent_id, None);
}

#[test]
fn test_move_target_resolved_after_removal() {
    let mut tree = sample();
    let mut ids = IdGenerator::from_seed("x");

    // Taking "a" out shifts "c" to index 1
    Mutation::MoveBlock {
        from: "0".parse().unwrap(),
        to: "1/0".parse().unwrap(),
    }
    .apply(&mut tree, &mut ids)
    .unwrap();

    assert_eq!(tree.roots(), &["b".to_string(), "c".to_string()]);
    assert_eq!(tree.get("c").unwrap().children, vec!["a".to_string()]);
    assert_eq!(get_block_by_path(&tree, &"1/0/1".parse().unwrap()).unwrap().id, "a2");
    tree.check_invariants().unwrap();
}

#[test]
fn test_move_into_own_subtree_is_rejected() {
    let mut tree = sample();
    let mut ids = IdGenerator::from_seed("x");
    let before = tree.clone();

    let result = Mutation::MoveBlockInto {
        block_id: "a".to_string(),
        new_parent_id: Some("a1".to_string()),
        index: 0,
    }
    .apply(&mut tree, &mut ids);

    assert_eq!(result, Err(MutationError::CycleDetected));
    assert_eq!(tree, before);
}

#[test]
fn test_move_into_reorders_within_parent() {
    let mut tree = sample();
    let mut ids = IdGenerator::from_seed("x");

    Mutation::MoveBlockInto {
        block_id: "a1".to_string(),
        new_parent_id: Some("a".to_string()),
        index: 1,
    }
    .apply(&mut tree, &mut ids)
    .unwrap();

    assert_eq!(tree.get("a").unwrap().children, vec!["a2".to_string(), "a1".to_string()]);
}

#[test]
fn test_clone_keeps_ids_and_styles() {
    let tree = sample();

    let clone = tree.subtree("a").unwrap();

    assert_eq!(clone.ids(), vec!["a", "a1", "a2"]);
    assert_eq!(clone.blocks[1].data.kind.content(), Some("two"));
}

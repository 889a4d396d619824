//! Lint diagnostics. Brush generators look at geometry and attributes, node
//! generators at a node's kind and children.

use brushwork_geometry::{BBox3, Brush};

use crate::{EditorConfig, Node, NodeId, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueKind {
    WorldBounds,
    NonIntegerVertices,
    NonIntegerPlanePoints,
    InvalidTextureScale,
    MixedBrushContents,
    EmptyGroup,
    EmptyBrushEntity,
    PointEntityWithBrushes,
    MissingClassname,
}

/// The command an issue can be fixed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickFix {
    /// Snap every vertex of the brush to the integer grid.
    SnapVertices,
    FindPlanePoints,
    /// Set the texture scale of the face back to 1.
    ResetTextureScale,
    DeleteObjects,
    /// Move the brushes of an entity up to the entity's parent.
    MoveBrushesToParent,
}

impl IssueKind {
    pub fn quick_fixes(self) -> &'static [QuickFix] {
        match self {
            IssueKind::WorldBounds => &[QuickFix::DeleteObjects],
            IssueKind::NonIntegerVertices => &[QuickFix::SnapVertices],
            IssueKind::NonIntegerPlanePoints => &[QuickFix::FindPlanePoints],
            IssueKind::InvalidTextureScale => &[QuickFix::ResetTextureScale],
            IssueKind::MixedBrushContents => &[],
            IssueKind::EmptyGroup | IssueKind::EmptyBrushEntity | IssueKind::MissingClassname => {
                &[QuickFix::DeleteObjects]
            }
            IssueKind::PointEntityWithBrushes => &[QuickFix::MoveBrushesToParent],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub kind: IssueKind,
    pub node: NodeId,
    /// Set for issues that concern a single face.
    pub face: Option<usize>,
    pub description: String,
}

impl Issue {
    /// An issue of the whole node rather than of one face.
    fn node(kind: IssueKind, node: NodeId, description: &str) -> Self {
        Self {
            kind,
            node,
            face: None,
            description: description.to_owned(),
        }
    }
}

pub trait IssueGenerator {
    fn kind(&self) -> IssueKind;
    fn generate(&self, node: NodeId, brush: &Brush, world_bounds: &BBox3, issues: &mut Vec<Issue>);
}

/// Checks a node's place in the tree. Unlike brush issues these are not
/// cached: they change when children come and go, not when the node does.
pub trait NodeIssueGenerator {
    fn kind(&self) -> IssueKind;
    fn generate(&self, node: &Node, config: &EditorConfig, issues: &mut Vec<Issue>);
}

pub struct WorldBoundsIssueGenerator;

impl IssueGenerator for WorldBoundsIssueGenerator {
    fn kind(&self) -> IssueKind {
        IssueKind::WorldBounds
    }

    fn generate(&self, node: NodeId, brush: &Brush, world_bounds: &BBox3, issues: &mut Vec<Issue>) {
        if !world_bounds.contains(&brush.bounds()) {
            issues.push(Issue::node(self.kind(), node, "Object is out of world bounds"));
        }
    }
}

pub struct NonIntegerVerticesIssueGenerator;

impl IssueGenerator for NonIntegerVerticesIssueGenerator {
    fn kind(&self) -> IssueKind {
        IssueKind::NonIntegerVertices
    }

    fn generate(&self, node: NodeId, brush: &Brush, _world_bounds: &BBox3, issues: &mut Vec<Issue>) {
        if !brush.has_integer_vertices() {
            issues.push(Issue::node(self.kind(), node, "Brush has non-integer vertices"));
        }
    }
}

pub struct NonIntegerPlanePointsIssueGenerator;

impl IssueGenerator for NonIntegerPlanePointsIssueGenerator {
    fn kind(&self) -> IssueKind {
        IssueKind::NonIntegerPlanePoints
    }

    fn generate(&self, node: NodeId, brush: &Brush, _world_bounds: &BBox3, issues: &mut Vec<Issue>) {
        if brush.faces().iter().any(|f| !f.has_integer_points()) {
            issues.push(Issue::node(self.kind(), node, "Brush has non-integer plane points"));
        }
    }
}

pub struct InvalidTextureScaleIssueGenerator;

impl IssueGenerator for InvalidTextureScaleIssueGenerator {
    fn kind(&self) -> IssueKind {
        IssueKind::InvalidTextureScale
    }

    fn generate(&self, node: NodeId, brush: &Brush, _world_bounds: &BBox3, issues: &mut Vec<Issue>) {
        for (index, face) in brush.faces().iter().enumerate() {
            if !face.attributes().valid() {
                issues.push(Issue {
                    kind: self.kind(),
                    node,
                    face: Some(index),
                    description: "Face has invalid texture scale.".to_owned(),
                });
            }
        }
    }
}

pub struct MixedBrushContentsIssueGenerator;

impl IssueGenerator for MixedBrushContentsIssueGenerator {
    fn kind(&self) -> IssueKind {
        IssueKind::MixedBrushContents
    }

    fn generate(&self, node: NodeId, brush: &Brush, _world_bounds: &BBox3, issues: &mut Vec<Issue>) {
        let mixed = brush
            .faces()
            .windows(2)
            .any(|pair| pair[0].attributes().surface_contents != pair[1].attributes().surface_contents);
        if mixed {
            issues.push(Issue::node(self.kind(), node, "Brush has mixed content flags"));
        }
    }
}

// ---------------------------------------------------------------------------
// Node issues
// ---------------------------------------------------------------------------

/// The classname of an entity node, None for other nodes and for entities
/// without one.
fn classname(node: &Node) -> Option<&str> {
    match node.kind() {
        NodeKind::Entity { properties } => properties.get("classname").map(String::as_str),
        _ => None,
    }
}

pub struct EmptyGroupIssueGenerator;

impl NodeIssueGenerator for EmptyGroupIssueGenerator {
    fn kind(&self) -> IssueKind {
        IssueKind::EmptyGroup
    }

    fn generate(&self, node: &Node, _config: &EditorConfig, issues: &mut Vec<Issue>) {
        if matches!(node.kind(), NodeKind::Group { .. }) && node.children().is_empty() {
            issues.push(Issue::node(self.kind(), node.id(), "Group has no children"));
        }
    }
}

pub struct EmptyBrushEntityIssueGenerator;

impl NodeIssueGenerator for EmptyBrushEntityIssueGenerator {
    fn kind(&self) -> IssueKind {
        IssueKind::EmptyBrushEntity
    }

    fn generate(&self, node: &Node, config: &EditorConfig, issues: &mut Vec<Issue>) {
        let Some(classname) = classname(node) else {
            return;
        };
        if !config.is_point_entity_class(classname) && node.children().is_empty() {
            issues.push(Issue::node(
                self.kind(),
                node.id(),
                &format!("Entity '{classname}' does not contain any brushes"),
            ));
        }
    }
}

pub struct PointEntityWithBrushesIssueGenerator;

impl NodeIssueGenerator for PointEntityWithBrushesIssueGenerator {
    fn kind(&self) -> IssueKind {
        IssueKind::PointEntityWithBrushes
    }

    fn generate(&self, node: &Node, config: &EditorConfig, issues: &mut Vec<Issue>) {
        let Some(classname) = classname(node) else {
            return;
        };
        if config.is_point_entity_class(classname) && !node.children().is_empty() {
            issues.push(Issue::node(
                self.kind(),
                node.id(),
                &format!("Point entity '{classname}' contains brushes"),
            ));
        }
    }
}

pub struct MissingClassnameIssueGenerator;

impl NodeIssueGenerator for MissingClassnameIssueGenerator {
    fn kind(&self) -> IssueKind {
        IssueKind::MissingClassname
    }

    fn generate(&self, node: &Node, _config: &EditorConfig, issues: &mut Vec<Issue>) {
        if matches!(node.kind(), NodeKind::Entity { .. }) && classname(node).is_none() {
            issues.push(Issue::node(self.kind(), node.id(), "Entity has no classname property"));
        }
    }
}

/// Every brush issue generator.
pub fn default_generators() -> Vec<Box<dyn IssueGenerator>> {
    vec![
        Box::new(WorldBoundsIssueGenerator),
        Box::new(NonIntegerVerticesIssueGenerator),
        Box::new(NonIntegerPlanePointsIssueGenerator),
        Box::new(InvalidTextureScaleIssueGenerator),
        Box::new(MixedBrushContentsIssueGenerator),
    ]
}

pub fn default_node_generators() -> Vec<Box<dyn NodeIssueGenerator>> {
    vec![
        Box::new(EmptyGroupIssueGenerator),
        Box::new(EmptyBrushEntityIssueGenerator),
        Box::new(PointEntityWithBrushesIssueGenerator),
        Box::new(MissingClassnameIssueGenerator),
    ]
}

#[cfg(test)]
mod tests {
    use bevy_math::{Mat4, Vec3};
    use brushwork_geometry::{BrushBuilder, TexCoordSystemKind};

    use super::*;

    fn world() -> BBox3 {
        BBox3::centered(8192.0)
    }

    fn generate(brush: &Brush, world_bounds: &BBox3) -> Vec<Issue> {
        let mut issues = Vec::new();
        for generator in default_generators() {
            generator.generate(NodeId(7), brush, world_bounds, &mut issues);
        }
        issues
    }

    fn cube() -> Brush {
        BrushBuilder::new(world(), TexCoordSystemKind::Paraxial)
            .create_cube(16.0, "stone")
            .unwrap()
    }

    #[test]
    fn clean_cube_has_no_issues() {
        assert!(generate(&cube(), &world()).is_empty());
    }

    #[test]
    fn each_generator_reports() {
        let mut brush = cube();
        brush.face_mut(2).unwrap().set_x_scale(0.0);
        brush.face_mut(3).unwrap().set_surface_contents(4);
        let issues = generate(&brush, &BBox3::centered(4.0));
        let kinds: Vec<IssueKind> = issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IssueKind::WorldBounds,
                IssueKind::InvalidTextureScale,
                IssueKind::MixedBrushContents
            ]
        );
        assert_eq!(issues[1].face, Some(2));
        assert_eq!(issues[1].description, "Face has invalid texture scale.");
    }

    #[test]
    fn off_grid_brush() {
        let mut brush = cube();
        brush
            .transform(&world(), &Mat4::from_translation(Vec3::splat(0.5)), false)
            .unwrap();
        let kinds: Vec<IssueKind> = generate(&brush, &world()).iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![IssueKind::NonIntegerVertices, IssueKind::NonIntegerPlanePoints]
        );
        assert_eq!(IssueKind::NonIntegerVertices.quick_fixes(), &[QuickFix::SnapVertices]);
    }

    fn node_issues(node: &Node) -> Vec<IssueKind> {
        let config = EditorConfig::default();
        let mut issues = Vec::new();
        for generator in default_node_generators() {
            generator.generate(node, &config, &mut issues);
        }
        issues.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn empty_group_and_brush_entity() {
        let mut group = Node::new(NodeId(2), NodeKind::group("g"));
        assert_eq!(node_issues(&group), vec![IssueKind::EmptyGroup]);
        group.children.push(NodeId(3));
        assert!(node_issues(&group).is_empty());

        let mut door = Node::new(NodeId(4), NodeKind::entity([("classname", "func_door")]));
        assert_eq!(node_issues(&door), vec![IssueKind::EmptyBrushEntity]);
        door.children.push(NodeId(5));
        assert!(node_issues(&door).is_empty());
    }

    #[test]
    fn point_entities_own_no_brushes() {
        let mut light = Node::new(NodeId(2), NodeKind::entity([("classname", "light")]));
        assert!(node_issues(&light).is_empty());
        light.children.push(NodeId(3));
        assert_eq!(node_issues(&light), vec![IssueKind::PointEntityWithBrushes]);
        assert_eq!(
            IssueKind::PointEntityWithBrushes.quick_fixes(),
            &[QuickFix::MoveBrushesToParent]
        );
    }

    #[test]
    fn entity_without_classname() {
        let entity = Node::new(NodeId(2), NodeKind::entity([("origin", "0 0 0")]));
        assert_eq!(node_issues(&entity), vec![IssueKind::MissingClassname]);
        assert!(node_issues(&Node::new(NodeId(3), NodeKind::layer("l"))).is_empty());
    }
}

//! Painted triangle meshes.
//!
//! This module holds the 3D input of the segmentation:
//! - [`TriangleMesh`] - Indexed triangle set in mm
//! - [`PaintedVolume`] - A mesh with per-face paint annotations
//! - [`PaintedObject`] - All volumes of one printed object
//!
//! Slicing of meshes into outlines, colored loops and top/bottom slabs lives
//! in [`slicer`].

pub mod slicer;

use crate::geometry::Point3F;
use crate::segmentation::Color;
use crate::{CoordF, Error, Result};
use serde::{Deserialize, Serialize};

/// Indexed triangle mesh. Vertices are in mm, faces are counter-clockwise
/// seen from outside.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3F>,
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<Point3F>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    /// Axis-aligned box between `min` and `max`.
    ///
    /// Face order: bottom (0, 1), top (2, 3), front y-min (4, 5),
    /// right x-max (6, 7), back y-max (8, 9), left x-min (10, 11).
    pub fn cuboid(min: Point3F, max: Point3F) -> Self {
        let vertices = vec![
            Point3F::new(min.x, min.y, min.z),
            Point3F::new(max.x, min.y, min.z),
            Point3F::new(max.x, max.y, min.z),
            Point3F::new(min.x, max.y, min.z),
            Point3F::new(min.x, min.y, max.z),
            Point3F::new(max.x, min.y, max.z),
            Point3F::new(max.x, max.y, max.z),
            Point3F::new(min.x, max.y, max.z),
        ];
        let indices = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];
        Self { vertices, indices }
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn triangle_vertices(&self, idx: usize) -> [Point3F; 3] {
        self.indices[idx].map(|i| self.vertices[i as usize])
    }

    /// Non-normalized face normal.
    pub fn face_normal(&self, idx: usize) -> Point3F {
        let [a, b, c] = self.triangle_vertices(idx);
        b.sub(&a).cross(&c.sub(&a))
    }

    /// Lowest and highest Z of the mesh.
    pub fn z_range(&self) -> Option<(CoordF, CoordF)> {
        self.vertices.iter().fold(None, |range, v| match range {
            None => Some((v.z, v.z)),
            Some((lo, hi)) => Some((lo.min(v.z), hi.max(v.z))),
        })
    }

    /// Check that every index addresses a vertex and all coordinates are finite.
    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len();
        if let Some((face, tri)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, tri)| tri.iter().any(|&i| i as usize >= n))
        {
            return Err(Error::Mesh(format!(
                "face {} references vertex {:?} but the mesh has {} vertices",
                face, tri, n
            )));
        }
        if self.vertices.iter().any(|v| !(v.x.is_finite() && v.y.is_finite() && v.z.is_finite())) {
            return Err(Error::Mesh("mesh contains non-finite vertex coordinates".into()));
        }
        Ok(())
    }
}

/// Which paint annotation of a volume drives the segmentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaintKind {
    MultiMaterial,
    FuzzySkin,
}

/// Per-face paint states of one volume as seen by one segmentation run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FacetsInfo {
    /// Paint state per face; empty means every face is unpainted.
    pub states: Vec<Color>,
    pub is_painted: bool,
    /// Faces left in the default state take the volume extruder.
    pub replace_default_extruder: bool,
}

impl FacetsInfo {
    /// Effective color of every face.
    ///
    /// With `replace_default_extruder`, an unpainted volume is printed
    /// entirely with its extruder and a painted one uses it for the faces in
    /// the default state. States outside `[0, num_states)` fall back to 0.
    pub fn resolve_colors(&self, face_count: usize, extruder_id: Option<usize>, num_states: usize) -> Vec<Color> {
        let extruder = extruder_id.and_then(|id| Color::try_from(id).ok());

        let mut colors = match (self.replace_default_extruder, self.is_painted, extruder) {
            (true, false, Some(id)) => vec![id; face_count],
            _ if self.states.len() == face_count => self.states.clone(),
            _ => vec![0; face_count],
        };

        if let (true, true, Some(id)) = (self.replace_default_extruder, self.is_painted, extruder) {
            if id > 0 {
                colors.iter_mut().filter(|c| **c == 0).for_each(|c| *c = id);
            }
        }

        for color in colors.iter_mut() {
            if *color as usize >= num_states {
                *color = 0;
            }
        }
        colors
    }
}

/// A mesh together with its paint annotations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintedVolume {
    pub mesh: TriangleMesh,
    /// Multi-material paint state per face (0 = default). Empty if unpainted.
    pub mm_colors: Vec<Color>,
    /// Fuzzy skin flag per face (0 = off, 1 = on). Empty if unpainted.
    pub fuzzy_skin: Vec<Color>,
    /// Extruder assigned to the whole volume, if any.
    pub extruder_id: Option<usize>,
    /// Modifiers and blockers are not model parts and are never sliced.
    pub is_model_part: bool,
}

impl PaintedVolume {
    /// Unpainted model part.
    pub fn new(mesh: TriangleMesh) -> Self {
        Self {
            mesh,
            is_model_part: true,
            ..Default::default()
        }
    }

    pub fn with_mm_colors(mut self, colors: Vec<Color>) -> Self {
        self.mm_colors = colors;
        self
    }

    pub fn with_fuzzy_skin(mut self, flags: Vec<Color>) -> Self {
        self.fuzzy_skin = flags;
        self
    }

    pub fn with_extruder(mut self, extruder_id: usize) -> Self {
        self.extruder_id = Some(extruder_id);
        self
    }

    /// Turn the volume into a modifier.
    pub fn as_modifier(mut self) -> Self {
        self.is_model_part = false;
        self
    }

    /// Paint all faces in `faces` with `color`.
    pub fn paint(&mut self, faces: impl IntoIterator<Item = usize>, color: Color) {
        if self.mm_colors.len() != self.mesh.triangle_count() {
            self.mm_colors = vec![0; self.mesh.triangle_count()];
        }
        for face in faces {
            if let Some(c) = self.mm_colors.get_mut(face) {
                *c = color;
            }
        }
    }

    pub fn is_mm_painted(&self) -> bool {
        self.mm_colors.iter().any(|&c| c != 0)
    }

    pub fn is_fuzzy_skin_painted(&self) -> bool {
        self.fuzzy_skin.iter().any(|&c| c != 0)
    }

    /// Paint annotation of the given kind.
    pub fn facets_info(&self, kind: PaintKind) -> FacetsInfo {
        match kind {
            PaintKind::MultiMaterial => FacetsInfo {
                states: self.mm_colors.clone(),
                is_painted: self.is_mm_painted(),
                replace_default_extruder: false,
            },
            PaintKind::FuzzySkin => FacetsInfo {
                states: self.fuzzy_skin.clone(),
                is_painted: self.is_fuzzy_skin_painted(),
                replace_default_extruder: false,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.mesh.validate()?;
        let faces = self.mesh.triangle_count();
        for (name, states) in [("mm_colors", &self.mm_colors), ("fuzzy_skin", &self.fuzzy_skin)] {
            if !states.is_empty() && states.len() != faces {
                return Err(Error::Mesh(format!(
                    "{} has {} entries but the mesh has {} faces",
                    name,
                    states.len(),
                    faces
                )));
            }
        }
        Ok(())
    }
}

/// All volumes of one printed object, in object coordinates (mm).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaintedObject {
    pub volumes: Vec<PaintedVolume>,
}

impl PaintedObject {
    pub fn new(volumes: Vec<PaintedVolume>) -> Self {
        Self { volumes }
    }

    pub fn validate(&self) -> Result<()> {
        self.volumes.iter().try_for_each(PaintedVolume::validate)
    }

    pub fn model_parts(&self) -> impl Iterator<Item = &PaintedVolume> {
        self.volumes.iter().filter(|v| v.is_model_part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube() -> TriangleMesh {
        TriangleMesh::cuboid(Point3F::new(0.0, 0.0, 0.0), Point3F::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_cuboid_normals_point_outward() {
        let mesh = unit_cube();
        assert_eq!(mesh.triangle_count(), 12);
        let expected = [
            (0.0, 0.0, -1.0),
            (0.0, 0.0, 1.0),
            (0.0, -1.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (-1.0, 0.0, 0.0),
        ];
        for (face, &(x, y, z)) in expected.iter().enumerate() {
            for tri in [2 * face, 2 * face + 1] {
                let n = mesh.face_normal(tri);
                assert!(n.x * x + n.y * y + n.z * z > 0.0, "triangle {} normal {:?}", tri, n);
            }
        }
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_index() {
        let mesh = TriangleMesh::new(vec![Point3F::default(); 3], vec![[0, 1, 3]]);
        assert!(matches!(mesh.validate(), Err(Error::Mesh(_))));
    }

    #[test]
    fn test_volume_rejects_mismatched_paint() {
        let volume = PaintedVolume::new(unit_cube()).with_mm_colors(vec![1; 5]);
        assert!(matches!(volume.validate(), Err(Error::Mesh(_))));
    }

    #[test]
    fn test_resolve_colors_remaps_default_and_out_of_range() {
        let info = FacetsInfo {
            states: vec![0, 1, 7],
            is_painted: true,
            replace_default_extruder: true,
        };
        assert_eq!(info.resolve_colors(3, Some(2), 4), vec![2, 1, 0]);

        let unpainted = FacetsInfo {
            states: Vec::new(),
            is_painted: false,
            replace_default_extruder: true,
        };
        assert_eq!(unpainted.resolve_colors(2, Some(3), 4), vec![3, 3]);

        let plain = FacetsInfo {
            replace_default_extruder: false,
            ..unpainted
        };
        assert_eq!(plain.resolve_colors(2, Some(3), 4), vec![0, 0]);
    }

    #[test]
    fn test_paint_faces() {
        let mut volume = PaintedVolume::new(unit_cube());
        assert!(!volume.is_mm_painted());
        volume.paint([2, 3], 1);
        assert!(volume.is_mm_painted());
        assert_eq!(volume.mm_colors.len(), 12);
        assert_eq!(volume.facets_info(PaintKind::MultiMaterial).states[3], 1);
        assert!(!volume.facets_info(PaintKind::FuzzySkin).is_painted);
    }

    #[test]
    fn test_model_parts_skip_modifiers() {
        let object = PaintedObject::new(vec![
            PaintedVolume::new(unit_cube()).with_extruder(2),
            PaintedVolume::new(unit_cube()).with_fuzzy_skin(vec![1; 12]).as_modifier(),
        ]);
        assert!(object.validate().is_ok());
        assert_eq!(object.model_parts().count(), 1);
        assert_eq!(object.volumes[0].extruder_id, Some(2));
        assert!(object.volumes[1].facets_info(PaintKind::FuzzySkin).is_painted);
    }
}

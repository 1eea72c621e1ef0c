//! Link labels of the hum container layout.
//!
//! These are layout metadata, not behaviour; every group, dataset,
//! attribute, and compound-field name the adapter touches is listed here.

/// Group holding the node coordinates.
pub const NODE_GROUP: &str = "Nodes";
/// Node coordinate dataset inside [`NODE_GROUP`].
pub const NODE_XYZ: &str = "XYZ";

/// Group holding the face datasets.
pub const FACE_GROUP: &str = "Faces";
/// Face record dataset (header + node ids) inside [`FACE_GROUP`].
pub const FACE_ENTITY: &str = "EntityID";
/// Face left/right cell dataset inside [`FACE_GROUP`].
pub const FACE_LR: &str = "FaceLRCell";

/// Group holding one subgroup per boundary patch.
pub const PATCH_GROUP: &str = "Patches";
/// Per-patch descriptor dataset.
pub const PATCH_INFO: &str = "PatchInfo";

/// Optional group holding prebuilt cell connectivity.
pub const CACHE_GROUP: &str = "Cache";
/// Cell-face adjacency dataset inside [`CACHE_GROUP`].
pub const CACHE_CELL_FACE: &str = "cellFace";
/// Cell-cell adjacency dataset inside [`CACHE_GROUP`].
pub const CACHE_CELL_CELL: &str = "cellCell";

/// Root scalar attribute: total cell count.
pub const ATTR_NUM_CELLS: &str = "NumCells";
/// Root scalar attribute: sum of face valences.
pub const ATTR_FACE_ADJNCY: &str = "FaceAdjncySize";
/// Root scalar attribute: internal face count.
pub const ATTR_NUM_INTERNAL: &str = "NumInternalFaces";
/// Root scalar attribute: width tag of the index type.
pub const ATTR_INT_WIDTH: &str = "IntegerT";
/// Root attribute: bounding-box minimum corner.
pub const ATTR_AABB_MIN: &str = "Min";
/// Root attribute: bounding-box maximum corner.
pub const ATTR_AABB_MAX: &str = "Max";

/// Compound field: bit-packed entity header.
pub const FIELD_BITS: &str = "BitField";
/// Compound field: entity id array.
pub const FIELD_ENTITY: &str = "EntityID";
/// Compound field: left cell id.
pub const FIELD_LEFT: &str = "Left";
/// Compound field: right cell id.
pub const FIELD_RIGHT: &str = "Right";
/// Compound field: boundary-condition type.
pub const FIELD_BC_TYPE: &str = "BCType";
/// Compound field: first face of the patch.
pub const FIELD_START_FACE: &str = "StartFace";
/// Compound field: face count of the patch.
pub const FIELD_FACE_COUNT: &str = "FaceCount";
/// Compound field: rank a processor patch is attached to.
pub const FIELD_PROC_ID: &str = "ProcID";

//! ISO 10303-21 export of triangle meshes using the AP203 schema.
//!
//! Every non-degenerate triangle becomes one planar `ADVANCED_FACE`; the
//! faces are collected in an `OPEN_SHELL` inside a shell-based surface
//! model, the STEP equivalent of a compound of faces. Builds without the
//! `step` feature write a placeholder text file instead and say so through
//! [`StepOutcome::Placeholder`].

use crate::capability::{self, Capability};
use crate::mesh::MeshData;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("write STEP {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("mesh has no exportable faces ({skipped} degenerate)")]
    NoFaces { skipped: usize },
}

#[derive(Debug, Clone)]
pub struct StepOptions {
    /// Product name recorded in the file.
    pub name: String,
    /// `FILE_NAME` timestamp; the current UTC time when unset.
    pub timestamp: Option<String>,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            name: "threedai".to_string(),
            timestamp: None,
        }
    }
}

impl StepOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Written { faces: usize, skipped: usize },
    Placeholder { reason: String },
}

pub fn write_step(
    mesh: &MeshData,
    path: &Path,
    options: &StepOptions,
) -> Result<StepOutcome, StepError> {
    let (contents, outcome) = match capability::step_export() {
        Capability::Available => {
            let doc = encode(mesh, options);
            if doc.faces == 0 {
                return Err(StepError::NoFaces {
                    skipped: doc.skipped,
                });
            }
            let outcome = StepOutcome::Written {
                faces: doc.faces,
                skipped: doc.skipped,
            };
            (doc.text, outcome)
        }
        Capability::Unavailable(reason) => {
            let text = placeholder_text(&reason);
            (text, StepOutcome::Placeholder { reason })
        }
    };

    let io_err = |source| StepError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, contents).map_err(io_err)?;
    Ok(outcome)
}

pub fn placeholder_text(reason: &str) -> String {
    format!(
        "This is a placeholder for a STEP file.\nSTEP export is unavailable: {reason}.\nRebuild threedai-core with the `step` feature for real STEP output.\n"
    )
}

#[derive(Debug, Clone)]
struct StepDocument {
    text: String,
    faces: usize,
    skipped: usize,
}

#[cfg(not(feature = "step"))]
fn encode(_mesh: &MeshData, _options: &StepOptions) -> StepDocument {
    StepDocument {
        text: String::new(),
        faces: 0,
        skipped: 0,
    }
}

#[cfg(feature = "step")]
fn encode(mesh: &MeshData, options: &StepOptions) -> StepDocument {
    ap203::mesh_document(mesh, options)
}

#[cfg(feature = "step")]
mod ap203 {
    use super::{StepDocument, StepOptions};
    use crate::mesh::{unit_or_zero, MeshData};
    use nalgebra::Vector3;
    use std::fmt::Write as _;

    /// Squared sine of the smallest corner angle a face may have and still
    /// get a plane. Relative to the edge lengths so scale does not matter.
    const DEGENERATE_SIN2: f64 = 1e-20;

    pub(super) fn mesh_document(mesh: &MeshData, options: &StepOptions) -> StepDocument {
        let safe_name = if options.name.trim().is_empty() {
            "threedai"
        } else {
            options.name.trim()
        };
        let safe_name = escape_step_string(safe_name);
        let timestamp = options
            .timestamp
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string());

        let mut writer = StepWriter::new();

        // AP203 product structure.
        let app_ctx = writer.push(
            "APPLICATION_CONTEXT('configuration controlled 3D designs of mechanical parts and assemblies')"
                .to_string(),
        );
        writer.push(format!(
            "APPLICATION_PROTOCOL_DEFINITION('international standard','config_control_design',1994,#{app_ctx})"
        ));
        let mech_ctx = writer.push(format!("MECHANICAL_CONTEXT('',#{app_ctx},'mechanical')"));
        let design_ctx = writer.push(format!("DESIGN_CONTEXT('',#{app_ctx},'design')"));
        let product = writer.push(format!(
            "PRODUCT('{safe_name}','{safe_name}','',(#{mech_ctx}))"
        ));
        let prod_def_form = writer.push(format!(
            "PRODUCT_DEFINITION_FORMATION_WITH_SPECIFIED_SOURCE('','',#{product},.NOT_KNOWN.)"
        ));
        let prod_def = writer.push(format!(
            "PRODUCT_DEFINITION('design','',#{prod_def_form},#{design_ctx})"
        ));
        let prod_def_shape = writer.push(format!("PRODUCT_DEFINITION_SHAPE('','',#{prod_def})"));

        let len_unit = writer.push("(LENGTH_UNIT()NAMED_UNIT(*)SI_UNIT(.MILLI.,.METRE.))".to_string());
        let plane_unit =
            writer.push("(NAMED_UNIT(*)PLANE_ANGLE_UNIT()SI_UNIT($,.RADIAN.))".to_string());
        let solid_unit =
            writer.push("(NAMED_UNIT(*)SOLID_ANGLE_UNIT()SI_UNIT($,.STERADIAN.))".to_string());
        let uncertainty = writer.push(format!(
            "UNCERTAINTY_MEASURE_WITH_UNIT(LENGTH_MEASURE(1.E-6),#{len_unit},'distance_accuracy_value','')"
        ));
        let rep_ctx = writer.push(format!(
            "(GEOMETRIC_REPRESENTATION_CONTEXT(3)GLOBAL_UNCERTAINTY_ASSIGNED_CONTEXT((#{uncertainty}))GLOBAL_UNIT_ASSIGNED_CONTEXT((#{len_unit},#{plane_unit},#{solid_unit}))REPRESENTATION_CONTEXT('',''))"
        ));

        let origin = writer.push(cartesian_point(&Vector3::zeros()));
        let z_axis = writer.push(direction(&Vector3::z()));
        let x_axis = writer.push(direction(&Vector3::x()));
        let world = writer.push(format!(
            "AXIS2_PLACEMENT_3D('',#{origin},#{z_axis},#{x_axis})"
        ));

        // Vertices are emitted lazily so unused ones stay out of the file.
        let mut vertex_ids: Vec<Option<(u32, u32)>> = vec![None; mesh.vertex_count()];
        let mut face_ids = Vec::with_capacity(mesh.face_count());
        let mut skipped = 0usize;

        for face in 0..mesh.face_count() {
            let tri = mesh.triangle(face);
            let (e1, e2) = (tri[1] - tri[0], tri[2] - tri[0]);
            let raw_normal = e1.cross(&e2);
            let area2 = raw_normal.norm_squared();
            if !area2.is_finite()
                || area2 <= DEGENERATE_SIN2 * e1.norm_squared() * e2.norm_squared()
            {
                skipped += 1;
                continue;
            }
            let normal = unit_or_zero(raw_normal);

            let indices = mesh.faces()[face];
            let mut corners = [(0u32, 0u32); 3];
            for (corner, &index) in corners.iter_mut().zip(indices.iter()) {
                let slot = &mut vertex_ids[index as usize];
                *corner = match *slot {
                    Some(ids) => ids,
                    None => {
                        let point = writer.push(cartesian_point(&tri_point(mesh, index)));
                        let vertex = writer.push(format!("VERTEX_POINT('',#{point})"));
                        *slot = Some((point, vertex));
                        (point, vertex)
                    }
                };
            }

            let mut oriented = Vec::with_capacity(3);
            for k in 0..3 {
                let (start_point, start_vertex) = corners[k];
                let (_, end_vertex) = corners[(k + 1) % 3];
                let delta = tri[(k + 1) % 3] - tri[k];
                let dir = writer.push(direction(&unit_or_zero(delta)));
                let vector = writer.push(format!("VECTOR('',#{dir},{})", f64_step(delta.norm())));
                let line = writer.push(format!("LINE('',#{start_point},#{vector})"));
                let edge = writer.push(format!(
                    "EDGE_CURVE('',#{start_vertex},#{end_vertex},#{line},.T.)"
                ));
                oriented.push(writer.push(format!("ORIENTED_EDGE('',*,*,#{edge},.T.)")));
            }
            let edge_loop = writer.push(format!("EDGE_LOOP('',({}))", ref_list(&oriented)));
            let bound = writer.push(format!("FACE_OUTER_BOUND('',#{edge_loop},.T.)"));

            let axis = writer.push(direction(&normal));
            let ref_dir = writer.push(direction(&unit_or_zero(tri[1] - tri[0])));
            let placement = writer.push(format!(
                "AXIS2_PLACEMENT_3D('',#{},#{axis},#{ref_dir})",
                corners[0].0
            ));
            let plane = writer.push(format!("PLANE('',#{placement})"));
            face_ids.push(writer.push(format!("ADVANCED_FACE('',(#{bound}),#{plane},.T.)")));
        }

        let shell = writer.push(format!("OPEN_SHELL('',({}))", ref_list(&face_ids)));
        let surface_model = writer.push(format!("SHELL_BASED_SURFACE_MODEL('',(#{shell}))"));
        let shape_rep = writer.push(format!(
            "MANIFOLD_SURFACE_SHAPE_REPRESENTATION('{safe_name}',(#{world},#{surface_model}),#{rep_ctx})"
        ));
        writer.push(format!(
            "SHAPE_DEFINITION_REPRESENTATION(#{prod_def_shape},#{shape_rep})"
        ));

        let mut out = String::new();
        let _ = writeln!(out, "ISO-10303-21;");
        let _ = writeln!(out, "HEADER;");
        let _ = writeln!(out, "FILE_DESCRIPTION(('threedai triangle mesh'),'2;1');");
        let _ = writeln!(
            out,
            "FILE_NAME('{safe_name}.step','{timestamp}',('threedai'),(''),'threedai','threedai','');"
        );
        let _ = writeln!(out, "FILE_SCHEMA(('CONFIG_CONTROL_DESIGN'));");
        let _ = writeln!(out, "ENDSEC;");
        let _ = writeln!(out, "DATA;");
        for line in writer.lines {
            let _ = writeln!(out, "{line}");
        }
        let _ = writeln!(out, "ENDSEC;");
        let _ = writeln!(out, "END-ISO-10303-21;");

        StepDocument {
            text: out,
            faces: face_ids.len(),
            skipped,
        }
    }

    struct StepWriter {
        next_id: u32,
        lines: Vec<String>,
    }

    impl StepWriter {
        fn new() -> Self {
            Self {
                next_id: 1,
                lines: Vec::new(),
            }
        }

        fn push(&mut self, entity: String) -> u32 {
            let id = self.next_id;
            self.next_id += 1;
            self.lines.push(format!("#{id}={entity};"));
            id
        }
    }

    fn tri_point(mesh: &MeshData, index: u32) -> Vector3<f64> {
        let [x, y, z] = mesh.vertices()[index as usize];
        Vector3::new(x, y, z)
    }

    fn escape_step_string(s: &str) -> String {
        s.replace('\'', "''")
    }

    fn f64_step(v: f64) -> String {
        if !v.is_finite() {
            return "0.".to_string();
        }
        if v != 0.0 && v.abs() < 1e-4 {
            return format!("{v:.6E}");
        }
        let mut s = format!("{v:.6}");
        if s == "-0.000000" {
            s = "0.000000".to_string();
        }
        s
    }

    fn cartesian_point(p: &Vector3<f64>) -> String {
        format!(
            "CARTESIAN_POINT('',({},{},{}))",
            f64_step(p.x),
            f64_step(p.y),
            f64_step(p.z)
        )
    }

    fn direction(d: &Vector3<f64>) -> String {
        format!(
            "DIRECTION('',({},{},{}))",
            f64_step(d.x),
            f64_step(d.y),
            f64_step(d.z)
        )
    }

    fn ref_list(ids: &[u32]) -> String {
        let mut out = String::new();
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "#{id}");
        }
        out
    }
}

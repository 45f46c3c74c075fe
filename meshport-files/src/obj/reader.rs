use std::io::Read;

use crate::ParserError;
use crate::common::types::{ColorRgba, Vector2, Vector3};
use crate::obj::types::{FaceVertex, MtlLibrary, MtlMaterial, ObjAsset, ObjFace, ObjGroup};

pub struct ObjReader {}

impl ObjReader {
    pub fn parse_asset<R: Read>(rdr: &mut R) -> Result<ObjAsset, ParserError> {
        let text = read_text(rdr)?;

        let mut asset = ObjAsset::default();
        let mut current = ObjGroup {
            name: "default".to_string(),
            ..Default::default()
        };

        for (line_num, keyword, args) in statements(&text) {
            match keyword {
                "v" => {
                    let values = parse_floats(&args, 3, line_num)?;
                    asset.positions.push(Vector3::new(values[0], values[1], values[2]));
                    if values.len() >= 6 {
                        // Colors may appear late; backfill everything before with white.
                        asset.colors.resize(asset.positions.len() - 1, ColorRgba::default());
                        asset.colors.push(ColorRgba {
                            r: values[3],
                            g: values[4],
                            b: values[5],
                            a: 1.0,
                        });
                    } else if !asset.colors.is_empty() {
                        asset.colors.push(ColorRgba::default());
                    }
                }
                "vt" => {
                    let values = parse_floats(&args, 1, line_num)?;
                    asset.tex_coords.push(Vector2::new(values[0], values.get(1).copied().unwrap_or(0.0)));
                }
                "vn" => {
                    let values = parse_floats(&args, 3, line_num)?;
                    asset.normals.push(Vector3::new(values[0], values[1], values[2]));
                }
                "f" => {
                    if args.len() < 3 {
                        return Err(syntax(line_num, "Face must have at least 3 vertices"));
                    }

                    let vertices = args
                        .iter()
                        .map(|arg| parse_face_vertex(arg, &asset, line_num))
                        .collect::<Result<Vec<_>, _>>()?;
                    current.faces.push(ObjFace { vertices });
                }
                "o" | "g" => {
                    let name = if args.is_empty() { "default".to_string() } else { args.join(" ") };
                    let material = current.material.clone();
                    start_group(&mut asset, &mut current, name, material);
                }
                "usemtl" => {
                    let material = Some(args.join(" "));
                    let name = current.name.clone();
                    start_group(&mut asset, &mut current, name, material);
                }
                "mtllib" => asset.material_libraries.extend(args.iter().map(|lib| lib.to_string())),
                // s, l, p, curves, ... are not needed for rendering triangle meshes
                _ => (),
            }
        }

        if !current.faces.is_empty() {
            asset.groups.push(current);
        }

        if asset.positions.is_empty() {
            return Err(ParserError::EmptySource);
        }

        Ok(asset)
    }

    pub fn parse_material_library<R: Read>(rdr: &mut R) -> Result<MtlLibrary, ParserError> {
        let text = read_text(rdr)?;
        let mut library = MtlLibrary::default();

        for (line_num, keyword, args) in statements(&text) {
            if keyword == "newmtl" {
                library.materials.push(MtlMaterial::new(&args.join(" ")));
                continue;
            }

            let Some(material) = library.materials.last_mut() else {
                // Statements before the first newmtl have nothing to attach to.
                continue;
            };

            match keyword {
                "Kd" => {
                    let values = parse_floats(&args, 3, line_num)?;
                    material.diffuse.r = values[0];
                    material.diffuse.g = values[1];
                    material.diffuse.b = values[2];
                }
                "d" => material.diffuse.a = parse_floats(&args, 1, line_num)?[0],
                "Tr" => material.diffuse.a = 1.0 - parse_floats(&args, 1, line_num)?[0],
                "Ns" => material.specular_exponent = Some(parse_floats(&args, 1, line_num)?[0]),
                "map_Kd" => {
                    // Options (-s 1 1 1, -bm 0.5, ...) precede the file name.
                    match args.last() {
                        Some(file) => material.diffuse_map = Some(file.to_string()),
                        None => return Err(syntax(line_num, "map_Kd without a file name")),
                    }
                }
                _ => (),
            }
        }

        Ok(library)
    }
}

fn read_text<R: Read>(rdr: &mut R) -> Result<String, ParserError> {
    let mut bytes = Vec::new();
    rdr.read_to_end(&mut bytes)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ParserError::EmptySource);
    }

    // Exporters are not consistent about encodings, names are the only non-ASCII content anyway.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Yields `(line number, keyword, arguments)` for every non-empty, non-comment line.
/// Lines ending in a backslash are continued on the next line.
fn statements(text: &str) -> impl Iterator<Item = (usize, &str, Vec<&str>)> {
    let mut pending: Vec<(usize, &str)> = Vec::new();
    let mut out = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        match line.strip_suffix('\\') {
            Some(continued) => pending.push((idx + 1, continued)),
            None => {
                let line_num = pending.first().map_or(idx + 1, |(num, _)| *num);
                let mut tokens = pending
                    .drain(..)
                    .flat_map(|(_, part)| part.split_whitespace())
                    .chain(line.split_whitespace());

                if let Some(keyword) = tokens.next() {
                    out.push((line_num, keyword, tokens.collect()));
                }
            }
        }
    }

    out.into_iter()
}

fn start_group(asset: &mut ObjAsset, current: &mut ObjGroup, name: String, material: Option<String>) {
    if current.faces.is_empty() {
        current.name = name;
        current.material = material;
        return;
    }

    let finished = std::mem::replace(
        current,
        ObjGroup {
            name,
            material,
            faces: Vec::new(),
        },
    );
    asset.groups.push(finished);
}

fn parse_floats(args: &[&str], min: usize, line_num: usize) -> Result<Vec<f32>, ParserError> {
    if args.len() < min {
        return Err(syntax(line_num, &format!("Expected at least {} values, got {}", min, args.len())));
    }

    args.iter()
        .map(|arg| {
            arg.parse::<f32>()
                .map_err(|_| syntax(line_num, &format!("Invalid float value '{}'", arg)))
        })
        .collect()
}

/// `1`, `1/2`, `1//3` or `1/2/3`
fn parse_face_vertex(spec: &str, asset: &ObjAsset, line_num: usize) -> Result<FaceVertex, ParserError> {
    let mut parts = spec.split('/');
    let position = match parts.next() {
        Some(idx) if !idx.is_empty() => resolve_index(idx, asset.positions.len(), line_num)?,
        _ => return Err(syntax(line_num, "Missing position index in face")),
    };

    let tex_coord = match parts.next() {
        Some(idx) if !idx.is_empty() => Some(resolve_index(idx, asset.tex_coords.len(), line_num)?),
        _ => None,
    };

    let normal = match parts.next() {
        Some(idx) if !idx.is_empty() => Some(resolve_index(idx, asset.normals.len(), line_num)?),
        _ => None,
    };

    Ok(FaceVertex {
        position,
        tex_coord,
        normal,
    })
}

/// One-based, negative values count backwards from the most recent element.
fn resolve_index(raw: &str, count: usize, line_num: usize) -> Result<usize, ParserError> {
    let idx: i64 = raw
        .parse()
        .map_err(|_| syntax(line_num, &format!("Invalid index '{}'", raw)))?;

    let resolved = match idx {
        0 => return Err(syntax(line_num, "Index cannot be 0")),
        idx if idx > 0 => idx - 1,
        idx => count as i64 + idx,
    };

    if resolved < 0 || resolved as usize >= count {
        return Err(syntax(
            line_num,
            &format!("Index {} out of range (have {} elements)", idx, count),
        ));
    }

    Ok(resolved as usize)
}

fn syntax(line: usize, reason: &str) -> ParserError {
    ParserError::SyntaxError {
        line,
        reason: reason.to_string(),
    }
}

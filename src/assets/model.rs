use base64::Engine;
use glam::{Mat3, Mat4, Vec3};

use super::fetch::{fetch_bytes, resolve};
use crate::error::AssetError;
use crate::scene::{MaterialData, MeshData, ModelData, TextureData, Vertex};

/// Fetches a glTF document and everything it references, then decodes it.
pub async fn load_model(url: &str) -> Result<ModelData, AssetError> {
    let bytes = fetch_bytes(url).await?;
    decode_model(&bytes, url).await
}

/// Decodes a `.gltf` or `.glb` payload; relative URIs resolve against `base_url`.
pub async fn decode_model(bytes: &[u8], base_url: &str) -> Result<ModelData, AssetError> {
    let gltf = gltf::Gltf::from_slice(bytes)?;
    let buffers = load_buffers(&gltf, base_url).await?;
    let textures = load_textures(&gltf.document, &buffers, base_url).await?;
    decode_document(&gltf.document, &buffers, textures)
}

async fn read_uri(base_url: &str, uri: &str) -> Result<Vec<u8>, AssetError> {
    if uri.starts_with("data:") {
        decode_data_uri(uri)
    } else {
        fetch_bytes(&resolve(base_url, uri)).await
    }
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| AssetError::Unsupported("data URI without payload".to_owned()))?;
    if header.ends_with(";base64") {
        Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}

async fn load_buffers(gltf: &gltf::Gltf, base_url: &str) -> Result<Vec<Vec<u8>>, AssetError> {
    let mut buffers = Vec::new();
    for buffer in gltf.document.buffers() {
        let mut data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or(AssetError::MissingBuffer(buffer.index()))?,
            gltf::buffer::Source::Uri(uri) => read_uri(base_url, uri).await?,
        };
        if data.len() < buffer.length() {
            return Err(AssetError::MissingBuffer(buffer.index()));
        }
        // Accessor reads assume 4-byte aligned buffer ends.
        while data.len() % 4 != 0 {
            data.push(0);
        }
        buffers.push(data);
    }
    Ok(buffers)
}

async fn load_textures(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    base_url: &str,
) -> Result<Vec<TextureData>, AssetError> {
    let mut textures = Vec::new();
    for gltf_image in document.images() {
        let encoded = match gltf_image.source() {
            gltf::image::Source::View { view, .. } => {
                let buffer = view.buffer().index();
                buffers
                    .get(buffer)
                    .and_then(|data| data.get(view.offset()..view.offset() + view.length()))
                    .ok_or(AssetError::MissingBuffer(buffer))?
                    .to_vec()
            }
            gltf::image::Source::Uri { uri, .. } => read_uri(base_url, uri).await?,
        };
        let rgba = image::load_from_memory(&encoded)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        textures.push(TextureData { width, height, pixels: rgba.into_raw() });
    }
    Ok(textures)
}

fn material_data(material: gltf::Material) -> MaterialData {
    let pbr = material.pbr_metallic_roughness();
    let image_of = |texture: gltf::Texture| texture.source().index();
    MaterialData {
        base_color_factor: pbr.base_color_factor(),
        base_color_texture: pbr.base_color_texture().map(|info| image_of(info.texture())),
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        metallic_roughness_texture: pbr.metallic_roughness_texture().map(|info| image_of(info.texture())),
        occlusion_texture: material.occlusion_texture().map(|occlusion| image_of(occlusion.texture())),
        occlusion_strength: material.occlusion_texture().map_or(1.0, |occlusion| occlusion.strength()),
        emissive_factor: material.emissive_factor(),
        emissive_texture: material.emissive_texture().map(|info| image_of(info.texture())),
    }
}

/// Flattens the default scene into world-space triangle lists.
pub fn decode_document(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    textures: Vec<TextureData>,
) -> Result<ModelData, AssetError> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AssetError::Unsupported("document has no scene".to_owned()))?;

    let materials: Vec<MaterialData> = document.materials().map(material_data).collect();
    // Primitives without a material share a default appended at the end.
    let fallback_material = materials.len();
    let mut model = ModelData { meshes: Vec::new(), materials, textures };

    for node in scene.nodes() {
        visit_node(&node, Mat4::IDENTITY, buffers, fallback_material, &mut model)?;
    }
    if model.meshes.iter().any(|mesh| mesh.material == fallback_material) {
        model.materials.push(MaterialData::default());
    }
    if model.meshes.is_empty() {
        log::warn!("glTF scene contains no triangle meshes");
    }
    Ok(model)
}

fn visit_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[Vec<u8>],
    fallback_material: usize,
    model: &mut ModelData,
) -> Result<(), AssetError> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if let Some(data) = read_primitive(&primitive, world, buffers, fallback_material)? {
                model.meshes.push(data);
            }
        }
    }
    for child in node.children() {
        visit_node(&child, world, buffers, fallback_material, model)?;
    }
    Ok(())
}

fn read_primitive(
    primitive: &gltf::Primitive,
    world: Mat4,
    buffers: &[Vec<u8>],
    fallback_material: usize,
) -> Result<Option<MeshData>, AssetError> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("Skipping {:?} primitive, only triangle lists are drawn", primitive.mode());
        return Ok(None);
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or(AssetError::MissingAttribute("POSITION"))?
        .collect();
    let mut indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    if indices.iter().any(|&index| index as usize >= positions.len()) {
        return Err(AssetError::Unsupported("index past the end of the vertex list".to_owned()));
    }
    indices.truncate(indices.len() - indices.len() % 3);

    let normals = match reader.read_normals() {
        Some(normals) => {
            let normals: Vec<[f32; 3]> = normals.collect();
            if normals.len() == positions.len() { normals } else { generate_normals(&positions, &indices) }
        }
        None => generate_normals(&positions, &indices),
    };
    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|uvs| uvs.into_f32().collect())
        .unwrap_or_default();

    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
    let vertices = positions
        .iter()
        .zip(&normals)
        .enumerate()
        .map(|(i, (position, normal))| Vertex {
            position: world.transform_point3(Vec3::from(*position)).to_array(),
            normal: (normal_matrix * Vec3::from(*normal)).normalize_or_zero().to_array(),
            uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
        })
        .collect();

    // Mirroring transforms flip the winding.
    if world.determinant() < 0.0 {
        for triangle in indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
    }

    Ok(Some(MeshData {
        vertices,
        indices,
        material: primitive.material().index().unwrap_or(fallback_material),
    }))
}

/// Area-weighted vertex normals for meshes that ship without them.
pub fn generate_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accumulated = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let (pa, pb, pc) = (Vec3::from(positions[a]), Vec3::from(positions[b]), Vec3::from(positions[c]));
        let face = (pb - pa).cross(pc - pa);
        accumulated[a] += face;
        accumulated[b] += face;
        accumulated[c] += face;
    }
    accumulated
        .into_iter()
        .map(|normal| normal.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "translation": [0.0, 0.0, 1.0] }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }] }],
        "materials": [{
            "pbrMetallicRoughness": {
                "baseColorFactor": [1.0, 0.0, 0.0, 1.0],
                "metallicFactor": 0.25,
                "roughnessFactor": 0.5
            }
        }],
        "buffers": [{ "byteLength": 42, "uri": "@URI@" }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    fn triangle_buffer() -> Vec<u8> {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let indices: [u16; 3] = [0, 1, 2];
        let mut bytes = bytemuck::cast_slice::<f32, u8>(&positions).to_vec();
        bytes.extend_from_slice(bytemuck::cast_slice::<u16, u8>(&indices));
        bytes
    }

    fn triangle_document(uri: &str) -> String {
        TRIANGLE_GLTF.replace("@URI@", uri)
    }

    fn embedded_triangle() -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(triangle_buffer());
        triangle_document(&format!("data:application/octet-stream;base64,{encoded}"))
    }

    #[test]
    fn decodes_embedded_triangle_with_node_transform() {
        let document = embedded_triangle();
        let model = pollster::block_on(decode_model(document.as_bytes(), "memory.gltf")).unwrap();

        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.triangle_count(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 1.0]);
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.vertices[2].uv, [0.0, 0.0]);
    }

    #[test]
    fn reads_metallic_roughness_material() {
        let document = embedded_triangle();
        let model = pollster::block_on(decode_model(document.as_bytes(), "memory.gltf")).unwrap();

        assert_eq!(model.materials.len(), 1);
        let material = &model.materials[model.meshes[0].material];
        assert_eq!(material.base_color_factor, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(material.metallic_factor, 0.25);
        assert_eq!(material.roughness_factor, 0.5);
        assert_eq!(material.base_color_texture, None);
        assert_eq!(material.emissive_factor, [0.0; 3]);
    }

    #[test]
    fn external_buffer_missing_on_disk_fails() {
        let document = triangle_document("missing.bin");
        let result = pollster::block_on(decode_model(document.as_bytes(), "./nowhere/model.gltf"));
        assert!(matches!(result, Err(AssetError::Io { .. })));
    }

    #[test]
    fn broken_data_uri_is_reported() {
        let document = triangle_document("data:application/octet-stream;base64,@@@");
        let result = pollster::block_on(decode_model(document.as_bytes(), "memory.gltf"));
        assert!(matches!(result, Err(AssetError::DataUri(_))));
    }

    #[test]
    fn non_gltf_bytes_are_rejected() {
        let result = pollster::block_on(decode_model(b"<html>404</html>", "memory.gltf"));
        assert!(matches!(result, Err(AssetError::Gltf(_))));
    }

    #[test]
    fn generated_normals_follow_winding() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        assert_eq!(generate_normals(&positions, &[0, 1, 2])[0], [0.0, 0.0, 1.0]);
        assert_eq!(generate_normals(&positions, &[0, 2, 1])[0], [0.0, 0.0, -1.0]);
    }

    #[test]
    fn plain_data_uri_is_percent_decoded() {
        assert_eq!(decode_data_uri("data:,a%20b").unwrap(), b"a b".to_vec());
    }
}

//! CPU rasterizer for textured tile meshes.
//!
//! Triangles are scan-converted over pixel centers with edge functions.
//! Pixels exactly on an edge belong to one triangle only, so the shared
//! diagonal of a cell is never drawn twice. Texels are sampled nearest
//! neighbour and composited source-over.

use image::{Rgba, RgbaImage};

use crate::mesh::TileMesh;

/// Draw every triangle of `mesh` into `target`, textured from `texture`.
pub fn draw_textured_mesh(target: &mut RgbaImage, mesh: &TileMesh, texture: &RgbaImage) {
    if texture.width() == 0 || texture.height() == 0 {
        return;
    }
    for (positions, uvs) in mesh.triangles() {
        draw_triangle(target, positions, uvs, texture);
    }
}

fn edge(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Tie-break for pixels exactly on the edge `a → b`.
///
/// Opposite directions give opposite answers, and with a consistent winding
/// a shared edge is walked in opposite directions by its two triangles.
fn owns_edge(a: [f64; 2], b: [f64; 2]) -> bool {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    dy < 0.0 || (dy == 0.0 && dx > 0.0)
}

fn draw_triangle(
    target: &mut RgbaImage,
    positions: [[f32; 2]; 3],
    uvs: [[f32; 2]; 3],
    texture: &RgbaImage,
) {
    let mut p = positions.map(|v| [f64::from(v[0]), f64::from(v[1])]);
    let mut t = uvs.map(|v| [f64::from(v[0]), f64::from(v[1])]);

    let mut area = edge(p[0], p[1], p[2]);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    // Normalize winding
    if area < 0.0 {
        p.swap(1, 2);
        t.swap(1, 2);
        area = -area;
    }

    let (width, height) = target.dimensions();
    let min_x = p.iter().map(|v| v[0]).fold(f64::INFINITY, f64::min).floor().max(0.0);
    let max_x = p.iter().map(|v| v[0]).fold(f64::NEG_INFINITY, f64::max).ceil().min(f64::from(width));
    let min_y = p.iter().map(|v| v[1]).fold(f64::INFINITY, f64::min).floor().max(0.0);
    let max_y = p.iter().map(|v| v[1]).fold(f64::NEG_INFINITY, f64::max).ceil().min(f64::from(height));
    if min_x >= max_x || min_y >= max_y {
        return;
    }

    let owns = [
        owns_edge(p[1], p[2]),
        owns_edge(p[2], p[0]),
        owns_edge(p[0], p[1]),
    ];
    let (tex_w, tex_h) = texture.dimensions();

    for y in min_y as u32..max_y as u32 {
        for x in min_x as u32..max_x as u32 {
            let c = [f64::from(x) + 0.5, f64::from(y) + 0.5];
            let w = [edge(p[1], p[2], c), edge(p[2], p[0], c), edge(p[0], p[1], c)];

            let inside = w
                .iter()
                .zip(owns)
                .all(|(&wi, own)| wi > 0.0 || (wi == 0.0 && own));
            if !inside {
                continue;
            }

            let u = (w[0] * t[0][0] + w[1] * t[1][0] + w[2] * t[2][0]) / area;
            let v = (w[0] * t[0][1] + w[1] * t[1][1] + w[2] * t[2][1]) / area;

            let tx = ((u * f64::from(tex_w)).floor().max(0.0) as u32).min(tex_w - 1);
            let ty = ((v * f64::from(tex_h)).floor().max(0.0) as u32).min(tex_h - 1);

            let src = *texture.get_pixel(tx, ty);
            blend_over(target.get_pixel_mut(x, y), src);
        }
    }
}

/// Source-over compositing with straight alpha.
fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src[3];
    if sa == 255 || dst[3] == 0 {
        *dst = src;
        return;
    }
    if sa == 0 {
        return;
    }

    let sa = f32::from(sa) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);

    for i in 0..3 {
        let sc = f32::from(src[i]);
        let dc = f32::from(dst[i]);
        dst[i] = ((sc * sa + dc * da * (1.0 - sa)) / out_a).round() as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

// =============================================================================
// Tests
// =============================================================================

//! Landmark-based face alignment.
//!
//! Warps a detected face to the canonical 112x112 ArcFace position using a
//! 4-DOF similarity transform (scale, rotation, translation) estimated from
//! the five detector landmarks by least squares.

use image::GrayImage;

const CROP_SIZE: u32 = 112;

/// Canonical ArcFace landmark positions for a 112x112 crop:
/// left eye, right eye, nose, left mouth, right mouth.
const CANONICAL_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

/// Align a face to the canonical crop.
///
/// Estimates the frame-to-crop similarity transform, then inverse-maps each
/// crop pixel into the frame with bilinear sampling. Out-of-frame samples
/// are black.
pub fn align_crop(frame: &GrayImage, landmarks: &[(f32, f32); 5]) -> GrayImage {
    let m = estimate_similarity(landmarks, &CANONICAL_LANDMARKS);
    let inv = invert_affine(&m);

    let mut crop = GrayImage::new(CROP_SIZE, CROP_SIZE);
    for y in 0..CROP_SIZE {
        for x in 0..CROP_SIZE {
            let dx = x as f32;
            let dy = y as f32;
            let sx = inv[0] * dx + inv[1] * dy + inv[2];
            let sy = inv[3] * dx + inv[4] * dy + inv[5];
            crop.put_pixel(x, y, image::Luma([sample_bilinear(frame, sx, sy)]));
        }
    }
    crop
}

/// Estimate a 2x3 similarity transform mapping `src` points onto `dst`
/// points by least squares.
///
/// Returned row-major as [a, -b, tx, b, a, ty] for the matrix
/// `[[a, -b, tx], [b, a, ty]]`.
fn estimate_similarity(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // Normal equations for the overdetermined system in [a, b, tx, ty]:
    //   sx*a - sy*b + tx = dx
    //   sy*a + sx*b + ty = dy
    let mut ata = [[0.0f32; 4]; 4];
    let mut atb = [0.0f32; 4];

    for i in 0..5 {
        let (sx, sy) = src[i];
        let (dx, dy) = dst[i];
        let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
        for (row, rhs) in rows {
            for j in 0..4 {
                for k in 0..4 {
                    ata[j][k] += row[j] * row[k];
                }
                atb[j] += row[j] * rhs;
            }
        }
    }

    let x = solve4(ata, atb);
    [x[0], -x[1], x[2], x[1], x[0], x[3]]
}

/// Solve a 4x4 linear system by Gaussian elimination with partial pivoting.
fn solve4(a: [[f32; 4]; 4], b: [f32; 4]) -> [f32; 4] {
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        m[i][..4].copy_from_slice(&a[i]);
        m[i][4] = b[i];
    }

    for col in 0..4 {
        let pivot = (col..4)
            .max_by(|&r1, &r2| {
                m[r1][col]
                    .abs()
                    .partial_cmp(&m[r2][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        m.swap(col, pivot);

        let diag = m[col][col];
        if diag.abs() < 1e-12 {
            continue;
        }
        for row in (col + 1)..4 {
            let factor = m[row][col] / diag;
            for k in col..5 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for row in (0..4).rev() {
        let mut acc = m[row][4];
        for k in (row + 1)..4 {
            acc -= m[row][k] * x[k];
        }
        x[row] = if m[row][row].abs() < 1e-12 {
            0.0
        } else {
            acc / m[row][row]
        };
    }
    x
}

/// Invert a 2x3 affine transform analytically.
fn invert_affine(m: &[f32; 6]) -> [f32; 6] {
    let det = m[0] * m[4] - m[1] * m[3];
    if det.abs() < 1e-12 {
        return [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    }
    [
        m[4] / det,
        -m[1] / det,
        (m[1] * m[5] - m[4] * m[2]) / det,
        -m[3] / det,
        m[0] / det,
        (m[3] * m[2] - m[0] * m[5]) / det,
    ]
}

/// Bilinear sample at a sub-pixel position; out-of-bounds reads as 0.
fn sample_bilinear(frame: &GrayImage, x: f32, y: f32) -> u8 {
    let w = frame.width() as i64;
    let h = frame.height() as i64;

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let read = |px: i64, py: i64| -> f32 {
        if px < 0 || py < 0 || px >= w || py >= h {
            0.0
        } else {
            frame.get_pixel(px as u32, py as u32)[0] as f32
        }
    };

    let top = read(x0, y0) * (1.0 - fx) + read(x0 + 1, y0) * fx;
    let bottom = read(x0, y0 + 1) * (1.0 - fx) + read(x0 + 1, y0 + 1) * fx;
    (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
}

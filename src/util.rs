use glam::DVec2;

/// Parses `#rgb`, `#rrggbb` or one of a few CSS colour names.
pub fn parse_color(s: &str) -> Option<[u8; 3]> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        if !hex.is_ascii() {
            return None;
        }
        return match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (o, c) in out.iter_mut().zip(hex.chars()) {
                    let v = c.to_digit(16)? as u8;
                    *o = v * 17;
                }
                Some(out)
            }
            6 => {
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
                Some([channel(0)?, channel(2)?, channel(4)?])
            }
            _ => None,
        };
    }
    let named = match s.to_ascii_lowercase().as_str() {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "lime" => [0, 255, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "gray" | "grey" => [128, 128, 128],
        _ => return None,
    };
    Some(named)
}

/// Strict point-in-polygon by ray casting. Points on the boundary are
/// outside. `ring` may or may not repeat its first vertex at the end.
pub fn point_in_polygon(p: DVec2, ring: &[DVec2]) -> bool {
    if ring.len() < 3 || on_boundary(p, ring) {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_boundary(p: DVec2, ring: &[DVec2]) -> bool {
    let n = ring.len();
    (0..n).any(|i| {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let ab = b - a;
        let ap = p - a;
        if ab == DVec2::ZERO {
            return ap == DVec2::ZERO;
        }
        let scale = ab.length() * ap.length();
        ab.perp_dot(ap).abs() <= 1e-9 * scale.max(1.0)
            && ap.dot(ab) >= 0.0
            && ap.dot(ab) <= ab.length_squared()
    })
}

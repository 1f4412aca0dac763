use crate::*;

/// Footprints are shrunk by this much before overlap tests so abutting cells do not collide.
pub const OVERLAP_TOLERANCE: float = 1e-3;

/// Box of a cell of `size` at `pos`, shrunk by [`OVERLAP_TOLERANCE`].
pub fn footprint(pos: Vector2, size: Vector2) -> [[float; 2]; 2] {
    Rect::from_size(pos.0, pos.1, size.0, size.1)
        .erosion(OVERLAP_TOLERANCE)
        .bbox()
}

/// Region whose lower-left corners give a cell of `size` overlapping `bbox`.
pub fn conflict_region(bbox: [[float; 2]; 2], size: Vector2) -> [[float; 2]; 2] {
    [
        [bbox[0][0] - size.0, bbox[0][1] - size.1],
        [bbox[1][0], bbox[1][1]],
    ]
}

/// Every row site where a cell of `size` fits inside its row and the die
/// without overlapping `occupied`. With `region`, only sites whose footprint
/// touches it are considered.
pub fn enumerate_sites(
    occupied: &Rtree,
    rows: &[PlacementRows],
    die: &DieSize,
    size: Vector2,
    region: Option<[[float; 2]; 2]>,
) -> Vec<Vector2> {
    let die_rect = die.rect().erosion(-OVERLAP_TOLERANCE);
    rows.par_iter()
        .flat_map_iter(|row| {
            let mut sites = Vec::new();
            if row.width <= 0.0 || row.num_cols <= 0 {
                return sites;
            }
            let (mut lo, mut hi) = (0, row.num_cols - 1);
            if let Some(r) = region {
                if row.y + size.1 <= r[0][1] || row.y >= r[1][1] {
                    return sites;
                }
                lo = lo.max(((r[0][0] - size.0 - row.x) / row.width).floor() as int);
                hi = hi.min(((r[1][0] - row.x) / row.width).ceil() as int);
            }
            let row_rtree = Rtree::from(occupied.intersection_bbox(
                Rect::from_size(row.x, row.y, row.end_x() - row.x, size.1).bbox(),
            ));
            for col in lo..=hi {
                let (x, y) = row.get_position(col);
                if x + size.0 > row.end_x() + OVERLAP_TOLERANCE {
                    break;
                }
                if !die_rect.contains(&Rect::from_size(x, y, size.0, size.1)) {
                    continue;
                }
                if let Some(r) = region {
                    let [[x0, y0], [x1, y1]] = footprint((x, y), size);
                    if x1 <= r[0][0] || x0 >= r[1][0] || y1 <= r[0][1] || y0 >= r[1][1] {
                        continue;
                    }
                }
                if row_rtree.count_bbox(footprint((x, y), size)) == 0 {
                    sites.push((x, y));
                }
            }
            sites
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows() -> Vec<PlacementRows> {
        (0..2)
            .map(|i| PlacementRows {
                x: 0.0,
                y: i as float,
                width: 1.0,
                height: 1.0,
                num_cols: 6,
            })
            .collect()
    }

    fn die() -> DieSize {
        DieSize::builder()
            .x_lower_left(0.0)
            .y_lower_left(0.0)
            .x_upper_right(6.0)
            .y_upper_right(2.0)
            .build()
    }

    #[test]
    fn sites_avoid_blockages_and_die_edge() {
        let occupied = Rtree::from([footprint((2.0, 0.0), (1.0, 1.0))]);
        let sites = enumerate_sites(&occupied, &rows(), &die(), (2.0, 1.0), None);
        // bottom row: x=0 and x=3,4 fit; top row: every x up to 4
        assert_eq!(
            sites,
            vec![(0.0, 0.0), (3.0, 0.0), (4.0, 0.0), (0.0, 1.0), (1.0, 1.0), (2.0, 1.0), (3.0, 1.0), (4.0, 1.0)]
        );
        // two rows tall only fits from the bottom row
        let tall = enumerate_sites(&Rtree::new(), &rows(), &die(), (1.0, 2.0), None);
        assert!(tall.iter().all(|p| p.1 == 0.0));
        assert_eq!(tall.len(), 6);
    }

    #[test]
    fn region_limits_the_scan() {
        let region = Some([[3.0, 0.0], [4.0, 1.0]]);
        let sites = enumerate_sites(&Rtree::new(), &rows(), &die(), (2.0, 1.0), region);
        assert_eq!(sites, vec![(2.0, 0.0), (3.0, 0.0)]);
    }
}

//! Cosmetic starfield shown above the title.

use rand::Rng;

const GLYPHS: [char; 3] = ['*', '.', '+'];

/// `height` lines of `width` columns with `count` stars at distinct random
/// cells. `count` is clamped to the number of cells.
pub fn starfield<R: Rng + ?Sized>(
    width: usize,
    height: usize,
    count: usize,
    rng: &mut R,
) -> Vec<String> {
    let cells = width * height;
    let mut grid = vec![' '; cells];
    for cell in rand::seq::index::sample(rng, cells, count.min(cells)) {
        grid[cell] = GLYPHS[rng.random_range(0..GLYPHS.len())];
    }
    grid.chunks(width.max(1))
        .take(height)
        .map(|row| row.iter().collect::<String>().trim_end().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn star_count(lines: &[String]) -> usize {
        lines
            .iter()
            .flat_map(|l| l.chars())
            .filter(|c| GLYPHS.contains(c))
            .count()
    }

    #[test]
    fn test_starfield_dimensions_and_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let lines = starfield(40, 3, 12, &mut rng);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.chars().count() <= 40));
        assert_eq!(star_count(&lines), 12);
    }

    #[test]
    fn test_starfield_clamps_to_cells() {
        let mut rng = StdRng::seed_from_u64(1);
        let lines = starfield(4, 2, 100, &mut rng);
        assert_eq!(star_count(&lines), 8);
    }

    #[test]
    fn test_starfield_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(starfield(0, 0, 5, &mut rng).is_empty());
        let blank = starfield(10, 2, 0, &mut rng);
        assert_eq!(blank, vec![String::new(), String::new()]);
    }

    #[test]
    fn test_starfield_is_seed_deterministic() {
        let a = starfield(30, 4, 10, &mut StdRng::seed_from_u64(42));
        let b = starfield(30, 4, 10, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}

use baryloc::{rectangular_grid, BarycentricLocator, Domain, Mesh, Quad};
use rand::prelude::*;

fn main() -> anyhow::Result<()> {
    let (xmin, xmax) = (0., 10.);
    let (ymin, ymax) = (0., 10.);
    let n = 200;

    // Container mesh with a field sampled at its nodes
    let (mesh, cells) = rectangular_grid(xmin, xmax, ymin, ymax, n, n)?;
    let domain = Domain::<Quad<2>, 2, 2>::new(&mesh, cells)?;
    let locator = BarycentricLocator::new(&domain)?;
    let source: Vec<f64> = mesh
        .positions()
        .iter()
        .map(|[x, y]| (x / 3.).sin() * (y / 2.).cos())
        .collect();

    // Embedded point cloud, slightly larger than the container
    let mut rng = rand::thread_rng();
    let embedded = Mesh::new(
        (0..420_000)
            .map(|_| [rng.gen::<f64>() * 11. - 0.5, rng.gen::<f64>() * 11. - 0.5])
            .collect(),
    );

    let mut destination = vec![f64::NAN; embedded.number_of_nodes()];
    locator.interpolate_field(&embedded, &source, &mut destination)?;

    let outside = locator.add_embedded_mesh(&embedded);
    let max_error = embedded
        .positions()
        .iter()
        .zip(&destination)
        .filter(|(_, value)| !value.is_nan())
        .map(|([x, y], value)| (value - (x / 3.).sin() * (y / 2.).cos()).abs())
        .fold(0., f64::max);
    println!(
        "{} nodes outside of the container, max interpolation error {:e}",
        outside.len(),
        max_error
    );

    Ok(())
}

//! TypeScript sources shared by integration tests

/// `sum(a, b, c)` and three call sites, one of them spreading its arguments
pub const SUM_MODULE: &str = "export function sum(a: number, c: number): number {
    return a + c;
}

export const total = sum(1, 2, 3);
";

pub const SUM_CALLER: &str = "import { sum } from './math';

const values: [number, number, number] = [4, 5, 6];
console.log(sum(7, 8, 9));
console.log(sum(...values));
";

/// A class whose only member is a static method
pub const STRINGS_MODULE: &str = "// String helpers
export class Strings {
    static shout(text: string): string {
        return text.toUpperCase() + '!';
    }
}
";

pub const STRINGS_CALLER: &str = "import { Strings } from './strings';

export const greeting = Strings.shout('hello');
";

pub const STRINGS_SECOND_CALLER: &str = "import { Strings } from '../strings';
import { other } from './other';

console.log(Strings.shout(other));
";

/// Declarations in an order the default policy wants changed
pub const MISORDERED_MODULE: &str = "import { x } from './x';

function helper(): number {
    return x;
}

// The main service
class Service {
    run() {
        return helper();
    }
}

const instance = new Service();
";
